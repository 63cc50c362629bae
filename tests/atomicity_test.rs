//! Forced store failures in the middle of an activity must leave nothing behind.
//! Failures are injected with SQLite triggers that abort a specific write.

mod common;

use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use bengkel_inventory::{
    auth::Principal,
    entities::user::Role,
    errors::{ServiceError, WriteStage},
    services::stock_validator::RequestedLine,
};
use common::{body_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn ledger_failure_rolls_back_header_items_and_stock() {
    let app = TestApp::new().await;
    let category = app.seed_category("Rem").await;
    let pads = app.seed_product("Kampas rem", 10, dec!(45000), category.id).await;
    let disc = app.seed_product("Piringan cakram", 4, dec!(175000), category.id).await;
    let ledger_before = app.ledger_count().await;

    app.exec(&format!(
        "CREATE TRIGGER fail_ledger BEFORE INSERT ON stock_ledger_entries \
         WHEN NEW.product_id = {} BEGIN SELECT RAISE(ABORT, 'ledger write failed'); END;",
        disc.id
    ))
    .await;

    let result = app
        .state
        .services
        .activities
        .create_outbound(
            Principal::new(app.employee_id, Role::Karyawan),
            vec![RequestedLine::new(pads.id, 3), RequestedLine::new(disc.id, 1)],
        )
        .await;
    assert_matches!(
        result,
        Err(ServiceError::PersistenceError {
            stage: WriteStage::Ledger,
            ..
        })
    );

    assert_eq!(app.activity_count().await, 0);
    assert_eq!(app.item_count().await, 0);
    assert_eq!(app.ledger_count().await, ledger_before);
    assert_eq!(app.stock_of(pads.id).await, 10);
    assert_eq!(app.stock_of(disc.id).await, 4);
}

#[tokio::test]
async fn stock_update_failure_rolls_back_earlier_updates() {
    let app = TestApp::new().await;
    let category = app.seed_category("Oli").await;
    let oil = app.seed_product("Oli gardan", 8, dec!(20000), category.id).await;
    let coolant = app.seed_product("Air radiator", 6, dec!(15000), category.id).await;
    let ledger_before = app.ledger_count().await;

    // The first line's counter update succeeds, the second one aborts.
    app.exec(&format!(
        "CREATE TRIGGER fail_stock BEFORE UPDATE OF stock ON products \
         WHEN NEW.id = {} BEGIN SELECT RAISE(ABORT, 'stock update failed'); END;",
        coolant.id
    ))
    .await;

    let result = app
        .state
        .services
        .activities
        .create_inbound(
            Principal::new(app.admin_id, Role::Admin),
            vec![RequestedLine::new(oil.id, 5), RequestedLine::new(coolant.id, 5)],
        )
        .await;
    assert_matches!(
        result,
        Err(ServiceError::PersistenceError {
            stage: WriteStage::StockUpdate,
            ..
        })
    );

    assert_eq!(app.activity_count().await, 0);
    assert_eq!(app.item_count().await, 0);
    assert_eq!(app.ledger_count().await, ledger_before);
    assert_eq!(app.stock_of(oil.id).await, 8);
    assert_eq!(app.stock_of(coolant.id).await, 6);
    assert_eq!(app.ledger_sum(oil.id).await, 8);
}

#[tokio::test]
async fn persistence_failure_surfaces_as_generic_server_error() {
    let app = TestApp::new().await;
    let category = app.seed_category("Filter").await;
    let filter = app.seed_product("Filter udara", 5, dec!(40000), category.id).await;

    app.exec(
        "CREATE TRIGGER fail_items BEFORE INSERT ON activity_items \
         BEGIN SELECT RAISE(ABORT, 'secret internal detail'); END;",
    )
    .await;

    let response = app
        .as_employee(
            Method::POST,
            "/activities",
            Some(json!({ "products": [{ "id": filter.id, "quantity": 1 }] })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "persistence_error");
    assert!(!body["error"].as_str().unwrap().contains("secret"));

    assert_eq!(app.activity_count().await, 0);
    assert_eq!(app.stock_of(filter.id).await, 5);
}

#[tokio::test]
async fn successful_activities_conserve_stock() {
    let app = TestApp::new().await;
    let category = app.seed_category("Campuran").await;
    let product = app.seed_product("Bohlam", 12, dec!(8000), category.id).await;
    let admin = Principal::new(app.admin_id, Role::Admin);
    let employee = Principal::new(app.employee_id, Role::Karyawan);
    let activities = app.state.services.activities.clone();

    let mut expected = 12;
    for (inbound, quantity) in [(false, 5), (true, 3), (false, 9), (false, 1), (true, 7)] {
        let lines = vec![RequestedLine::new(product.id, quantity)];
        if inbound {
            activities.create_inbound(admin, lines).await.unwrap();
            expected += quantity as i32;
        } else {
            activities.create_outbound(employee, lines).await.unwrap();
            expected -= quantity as i32;
        }
        assert_eq!(app.stock_of(product.id).await, expected);
        assert_eq!(app.ledger_sum(product.id).await, expected as i64);
    }
}
