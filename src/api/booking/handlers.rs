use actix_web::{
    get, post, put,
    web::{Data, Path, ServiceConfig, scope},
    HttpResponse,
};
use actix_web_validator::{Json, Query};

use crate::api::caller::Caller;

use super::error::ServiceError;
use super::models::{
    AcceptQuery, CreateJobRequest, DistanceFeedRequest, HistoryQuery, ImmediateJobEmailRequest,
    IndexQuery, JobActionRequest, UpdateJobRequest,
};
use super::service::BookingService;

type Reply = Result<HttpResponse, ServiceError>;

#[get("")]
async fn index(service: Data<BookingService>, caller: Caller, query: Query<IndexQuery>) -> Reply {
    let jobs = service.get_all(&caller, &query.filter(), query.user_id).await?;
    Ok(HttpResponse::Ok().json(jobs))
}

#[post("")]
async fn store(
    service: Data<BookingService>,
    caller: Caller,
    request: Json<CreateJobRequest>,
) -> Reply {
    let created = service.create_job(&caller, request.into_inner()).await?;
    Ok(HttpResponse::Created().json(created))
}

#[get("/history")]
async fn history(
    service: Data<BookingService>,
    caller: Caller,
    query: Query<HistoryQuery>,
) -> Reply {
    let history = service.get_history(&caller, query.user_id, query.page).await?;
    Ok(HttpResponse::Ok().json(history))
}

#[get("/potential")]
async fn potential_jobs(service: Data<BookingService>, caller: Caller) -> Reply {
    let jobs = service.get_potential_jobs(&caller).await?;
    Ok(HttpResponse::Ok().json(jobs))
}

#[post("/immediate-email")]
async fn immediate_job_email(
    service: Data<BookingService>,
    caller: Caller,
    request: Json<ImmediateJobEmailRequest>,
) -> Reply {
    let outcome = service.immediate_job_email(&caller, request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[post("/offer")]
async fn offer_job(
    service: Data<BookingService>,
    caller: Caller,
    request: Json<JobActionRequest>,
) -> Reply {
    let outcome = service.offer_job(&caller, request.job_id).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[post("/accept")]
async fn accept_job(
    service: Data<BookingService>,
    caller: Caller,
    request: Json<JobActionRequest>,
) -> Reply {
    let outcome = service.accept_job(&caller, request.job_id).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[get("/accept")]
async fn accept_job_with_id(
    service: Data<BookingService>,
    caller: Caller,
    query: Query<AcceptQuery>,
) -> Reply {
    let outcome = service.accept_job_with_id(&caller, query.job_id).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[post("/cancel")]
async fn cancel_job(
    service: Data<BookingService>,
    caller: Caller,
    request: Json<JobActionRequest>,
) -> Reply {
    let outcome = service.cancel_job(&caller, request.job_id).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[post("/start")]
async fn start_job(
    service: Data<BookingService>,
    caller: Caller,
    request: Json<JobActionRequest>,
) -> Reply {
    let outcome = service.start_job(&caller, request.job_id).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[post("/end")]
async fn end_job(
    service: Data<BookingService>,
    caller: Caller,
    request: Json<JobActionRequest>,
) -> Reply {
    let outcome = service.end_job(&caller, request.job_id).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[post("/customer-not-call")]
async fn customer_not_call(
    service: Data<BookingService>,
    caller: Caller,
    request: Json<JobActionRequest>,
) -> Reply {
    let outcome = service.customer_not_call(&caller, request.job_id).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[post("/distance-feed")]
async fn distance_feed(
    service: Data<BookingService>,
    caller: Caller,
    request: Json<DistanceFeedRequest>,
) -> Reply {
    let outcome = service.distance_feed(&caller, request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[post("/reopen")]
async fn reopen(
    service: Data<BookingService>,
    caller: Caller,
    request: Json<JobActionRequest>,
) -> Reply {
    let outcome = service.reopen(&caller, request.job_id).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[post("/resend-notifications")]
async fn resend_notifications(
    service: Data<BookingService>,
    caller: Caller,
    request: Json<JobActionRequest>,
) -> Reply {
    let outcome = service.resend_notifications(&caller, request.job_id).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[post("/resend-sms")]
async fn resend_sms_notifications(
    service: Data<BookingService>,
    caller: Caller,
    request: Json<JobActionRequest>,
) -> Reply {
    let outcome = service.resend_sms_notifications(&caller, request.job_id).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[get("/{id}")]
async fn show(service: Data<BookingService>, caller: Caller, id: Path<i64>) -> Reply {
    let details = service.show(&caller, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(details))
}

#[put("/{id}")]
async fn update(
    service: Data<BookingService>,
    caller: Caller,
    id: Path<i64>,
    request: Json<UpdateJobRequest>,
) -> Reply {
    let updated = service.update_job(&caller, id.into_inner(), request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(updated))
}

/// Literal paths are registered before `/{id}` so they are matched first
pub fn booking_config(config: &mut ServiceConfig) {
    config.service(
        scope("bookings")
            .service(index)
            .service(store)
            .service(history)
            .service(potential_jobs)
            .service(immediate_job_email)
            .service(offer_job)
            .service(accept_job)
            .service(accept_job_with_id)
            .service(cancel_job)
            .service(start_job)
            .service(end_job)
            .service(customer_not_call)
            .service(distance_feed)
            .service(reopen)
            .service(resend_notifications)
            .service(resend_sms_notifications)
            .service(show)
            .service(update),
    );
}
