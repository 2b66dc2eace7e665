mod common;

use std::sync::Arc;

use actix_web::{http::StatusCode, test, web, App};
use booking_dispatch::api::caller::{USER_ID_HEADER, USER_TYPE_HEADER};
use booking_dispatch::api::validation;
use serde_json::{json, Value};

use common::*;

macro_rules! app {
    ($service:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($service))
                .app_data(web::Data::new(roles()))
                .app_data(validation::json_config())
                .app_data(validation::query_config())
                .configure(booking_dispatch::routes),
        )
        .await
    };
}

fn as_user(req: test::TestRequest, user_id: i64, user_type: i32) -> test::TestRequest {
    req.insert_header((USER_ID_HEADER, user_id.to_string()))
        .insert_header((USER_TYPE_HEADER, user_type.to_string()))
}

fn as_customer(req: test::TestRequest) -> test::TestRequest {
    as_user(req, CUSTOMER, roles().customer_role_id)
}

fn as_translator(req: test::TestRequest, id: i64) -> test::TestRequest {
    as_user(req, id, roles().translator_role_id)
}

fn as_admin(req: test::TestRequest) -> test::TestRequest {
    as_user(req, ADMIN, roles().admin_role_id)
}

#[actix_web::test]
async fn test_booking_lifecycle_over_http() {
    let (service, _) = service().await;
    let app = app!(service);

    let req = as_customer(test::TestRequest::post().uri("/bookings"))
        .set_json(json!({"language": "sv", "duration_minutes": 60}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["job"]["status"], "pending");
    let job_id = body["job"]["id"].as_i64().unwrap();

    let req = as_customer(test::TestRequest::post().uri("/bookings/offer"))
        .set_json(json!({"job_id": job_id}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["job"]["status"], "offered");
    assert_eq!(body["notifications"][0]["success"], true);

    let req = as_translator(test::TestRequest::get(), TRANSLATOR_A)
        .uri(&format!("/bookings/accept?job_id={}", job_id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["job"]["status"], "accepted");
    assert_eq!(body["transition"]["from"], "offered");

    let req = as_translator(test::TestRequest::post().uri("/bookings/accept"), TRANSLATOR_B)
        .set_json(json!({"jobid": job_id}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Already taken");

    let req = as_translator(test::TestRequest::post().uri("/bookings/end"), TRANSLATOR_A)
        .set_json(json!({"job_id": job_id}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["job"]["status"], "completed");

    let req = as_customer(test::TestRequest::get())
        .uri(&format!("/bookings/history?user_id={}", CUSTOMER))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["jobs"][0]["id"], job_id);
}

#[actix_web::test]
async fn test_missing_identity_is_unauthorized() {
    let (service, _) = service().await;
    let app = app!(service);

    let req = test::TestRequest::get().uri("/bookings").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_index_is_role_gated() {
    let (service, _) = service().await;
    offered_job(&service).await;
    let app = app!(service);

    let req = as_customer(test::TestRequest::get().uri("/bookings")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = as_customer(test::TestRequest::get())
        .uri(&format!("/bookings?user_id={}", CUSTOMER))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["count"], 1);

    let req = as_admin(test::TestRequest::get().uri("/bookings?status=accepted")).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["count"], 0);
}

#[actix_web::test]
async fn test_history_without_user_id_is_empty_list() {
    let (service, _) = service().await;
    let app = app!(service);

    let req = as_customer(test::TestRequest::get().uri("/bookings/history")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["jobs"], json!([]));
}

#[actix_web::test]
async fn test_history_requires_identity_and_ownership() {
    let (service, _) = service().await;
    let job = accepted_job(&service).await;
    service.end_job(&translator(TRANSLATOR_A), job.id).await.unwrap();
    let app = app!(service);

    let uri = format!("/bookings/history?user_id={}", CUSTOMER);

    let req = test::TestRequest::get().uri(&uri).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = as_user(test::TestRequest::get().uri(&uri), OTHER_CUSTOMER, roles().customer_role_id)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = as_admin(test::TestRequest::get().uri(&uri)).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["total"], 1);
}

#[actix_web::test]
async fn test_invalid_body_uses_standard_error_shape() {
    let (service, _) = service().await;
    let app = app!(service);

    let req = as_customer(test::TestRequest::post().uri("/bookings"))
        .set_json(json!({"language": "s"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Validation failed");
    assert!(body["fields"]["language"]["errors"].is_array());
}

#[actix_web::test]
async fn test_distance_feed_and_show() {
    let (service, _) = service().await;
    let job = accepted_job(&service).await;
    let app = app!(service);

    let req = as_admin(test::TestRequest::post().uri("/bookings/distance-feed"))
        .set_json(json!({
            "jobid": job.id,
            "distance": "14.5",
            "time": "",
            "session_time": "01:10",
            "flagged": "false",
            "admincomment": ""
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["message"], "Record updated!");

    let req = as_customer(test::TestRequest::get())
        .uri(&format!("/bookings/{}", job.id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["distance"]["distance"], 14.5);
    assert_eq!(body["distance"]["time"], Value::Null);
    assert_eq!(body["job"]["session_time"], "01:10");

    let req = as_admin(test::TestRequest::post().uri("/bookings/distance-feed"))
        .set_json(json!({"jobid": job.id, "flagged": "true", "admincomment": ""}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_resend_sms_reports_failure_in_success_field() {
    let service = service_with(seeded_store().await, Arc::new(FailingTransport));
    let job = offered_job(&service).await;
    let app = app!(service);

    let req = as_admin(test::TestRequest::post().uri("/bookings/resend-sms"))
        .set_json(json!({"jobid": job.id}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], "delivery failed: SMS gateway returned 503");
}

#[actix_web::test]
async fn test_health_probes() {
    let (service, _) = service().await;
    let app = app!(service);

    for path in ["/health", "/ready", "/live"] {
        let req = test::TestRequest::get().uri(path).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "{} should be up", path);
    }
}
