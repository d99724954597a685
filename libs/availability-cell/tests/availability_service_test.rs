use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use availability_cell::models::{
    AvailabilityError, BreakWindow, CreateAvailabilityRequest, UpdateAvailabilityRequest,
};
use availability_cell::services::AvailabilityService;
use shared_utils::test_utils::TestConfig;

struct TestSetup {
    server: MockServer,
    service: AvailabilityService,
    owner_id: Uuid,
    doctor_id: Uuid,
}

impl TestSetup {
    async fn new() -> Self {
        let server = MockServer::start().await;
        let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();
        let service = AvailabilityService::new(&config);
        Self {
            server,
            service,
            owner_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
        }
    }

    fn create_request(&self) -> CreateAvailabilityRequest {
        CreateAvailabilityRequest {
            date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            opening_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            closing_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            duration_minutes: 30,
            break_times: vec![],
            doctor_id: self.doctor_id,
        }
    }

    fn availability_row(&self, availability_id: Uuid) -> serde_json::Value {
        json!({
            "id": availability_id,
            "date": "2026-09-01",
            "opening_time": "09:00",
            "closing_time": "12:00",
            "duration_minutes": 30,
            "break_times": [],
            "doctor_id": self.doctor_id,
            "owner_id": self.owner_id,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        })
    }

    async fn mock_doctor_lookup(&self, found: bool) {
        let body = if found {
            json!([{"id": self.doctor_id}])
        } else {
            json!([])
        };
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .and(query_param("role", "eq.doctor"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    async fn mock_duplicate_check(&self, existing: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/availabilities"))
            .and(query_param("date", "eq.2026-09-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(existing))
            .mount(&self.server)
            .await;
    }
}

#[tokio::test]
async fn create_availability_happy_path() {
    let setup = TestSetup::new().await;
    let availability_id = Uuid::new_v4();

    setup.mock_doctor_lookup(true).await;
    setup.mock_duplicate_check(json!([])).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/availabilities"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!([setup.availability_row(availability_id)])),
        )
        .mount(&setup.server)
        .await;

    let availability = setup
        .service
        .create_availability(
            &setup.owner_id.to_string(),
            setup.create_request(),
            "token",
        )
        .await
        .unwrap();

    assert_eq!(availability.id, availability_id);
    assert_eq!(availability.duration_minutes, 30);
}

#[tokio::test]
async fn create_availability_rejects_duplicate_schedule() {
    let setup = TestSetup::new().await;

    setup.mock_doctor_lookup(true).await;
    setup
        .mock_duplicate_check(json!([{"id": Uuid::new_v4()}]))
        .await;

    let err = setup
        .service
        .create_availability(
            &setup.owner_id.to_string(),
            setup.create_request(),
            "token",
        )
        .await
        .unwrap_err();

    assert_matches!(err, AvailabilityError::Conflict(_));
}

#[tokio::test]
async fn storage_conflict_maps_to_duplicate_schedule() {
    // The pre-check saw nothing, but the unique index rejects the insert.
    let setup = TestSetup::new().await;

    setup.mock_doctor_lookup(true).await;
    setup.mock_duplicate_check(json!([])).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/availabilities"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint"
        })))
        .mount(&setup.server)
        .await;

    let err = setup
        .service
        .create_availability(
            &setup.owner_id.to_string(),
            setup.create_request(),
            "token",
        )
        .await
        .unwrap_err();

    assert_matches!(err, AvailabilityError::Conflict(msg) => {
        assert!(msg.contains("already exists"));
    });
}

#[tokio::test]
async fn create_availability_rejects_unknown_doctor() {
    let setup = TestSetup::new().await;

    setup.mock_doctor_lookup(false).await;

    let err = setup
        .service
        .create_availability(
            &setup.owner_id.to_string(),
            setup.create_request(),
            "token",
        )
        .await
        .unwrap_err();

    assert_matches!(err, AvailabilityError::InvalidDoctor(_));
}

#[tokio::test]
async fn create_availability_rejects_break_outside_window() {
    let setup = TestSetup::new().await;

    let mut request = setup.create_request();
    request.break_times = vec![BreakWindow {
        start_time: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(13, 30, 0).unwrap(),
    }];

    let err = setup
        .service
        .create_availability(&setup.owner_id.to_string(), request, "token")
        .await
        .unwrap_err();

    assert_matches!(err, AvailabilityError::ValidationError(_));
}

#[tokio::test]
async fn update_validates_against_merged_record() {
    // Only the closing time is sent; it must be checked against the stored
    // opening time.
    let setup = TestSetup::new().await;
    let availability_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/availabilities"))
        .and(query_param("id", format!("eq.{}", availability_id)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([setup.availability_row(availability_id)])),
        )
        .mount(&setup.server)
        .await;

    let request = UpdateAvailabilityRequest {
        closing_time: Some(NaiveTime::from_hms_opt(8, 0, 0).unwrap()),
        ..Default::default()
    };

    let err = setup
        .service
        .update_availability(&availability_id.to_string(), request, "token")
        .await
        .unwrap_err();

    assert_matches!(err, AvailabilityError::ValidationError(_));
}

#[tokio::test]
async fn delete_blocked_while_appointments_are_scheduled() {
    let setup = TestSetup::new().await;
    let availability_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/availabilities"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([setup.availability_row(availability_id)])),
        )
        .mount(&setup.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.scheduled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": Uuid::new_v4()}])))
        .mount(&setup.server)
        .await;

    let err = setup
        .service
        .delete_availability(&availability_id.to_string(), "token")
        .await
        .unwrap_err();

    assert_matches!(err, AvailabilityError::HasActiveAppointments);
}

#[tokio::test]
async fn delete_succeeds_without_scheduled_appointments() {
    let setup = TestSetup::new().await;
    let availability_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/availabilities"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([setup.availability_row(availability_id)])),
        )
        .mount(&setup.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&setup.server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/availabilities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&setup.server)
        .await;

    setup
        .service
        .delete_availability(&availability_id.to_string(), "token")
        .await
        .unwrap();
}

#[tokio::test]
async fn missing_availability_is_not_found() {
    let setup = TestSetup::new().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/availabilities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&setup.server)
        .await;

    let err = setup
        .service
        .get_availability_by_id(&Uuid::new_v4().to_string(), "token")
        .await
        .unwrap_err();

    assert_matches!(err, AvailabilityError::NotFound);
}
