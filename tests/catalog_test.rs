mod common;

use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use bengkel_inventory::{
    entities::price_history,
    errors::ServiceError,
    services::products::{UpdateProductInput, INITIAL_STOCK_NOTE},
};
use common::{body_json, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;
use std::str::FromStr;

fn update_input(name: &str, price: Decimal, category_id: i32) -> UpdateProductInput {
    UpdateProductInput {
        name: name.to_string(),
        price,
        location: "Rak B2".to_string(),
        category_id,
    }
}

async fn price_history_count(app: &TestApp, product_id: i32) -> u64 {
    price_history::Entity::find()
        .filter(price_history::Column::ProductId.eq(product_id))
        .count(app.db())
        .await
        .unwrap()
}

#[tokio::test]
async fn admin_manages_categories() {
    let app = TestApp::new().await;

    let response = app
        .as_admin(Method::POST, "/categories", Some(json!({ "name": "  Kelistrikan " })))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["name"], "Kelistrikan");
    let id = created["id"].as_i64().unwrap();

    let response = app
        .as_admin(Method::POST, "/categories", Some(json!({ "name": "Kelistrikan" })))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .as_admin(
            Method::PUT,
            &format!("/categories/{}", id),
            Some(json!({ "name": "Kelistrikan Motor" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], "Kelistrikan Motor");

    let response = app.as_employee(Method::GET, "/categories", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["name"], "Kelistrikan Motor");

    let response = app
        .as_admin(Method::DELETE, &format!("/categories/{}", id), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .as_employee(Method::GET, &format!("/categories/{}", id), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn category_with_live_products_cannot_be_deleted() {
    let app = TestApp::new().await;
    let category = app.seed_category("Knalpot").await;
    let product = app.seed_product("Knalpot racing", 1, dec!(750000), category.id).await;

    let result = app.state.services.categories.delete(category.id).await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));

    app.state.services.products.delete(product.id).await.unwrap();
    app.state
        .services
        .categories
        .delete(category.id)
        .await
        .expect("category without live products can be deleted");
}

#[tokio::test]
async fn deleted_category_name_can_be_reused() {
    let app = TestApp::new().await;
    let category = app.seed_category("Velg").await;
    app.state.services.categories.delete(category.id).await.unwrap();

    let response = app
        .as_admin(Method::POST, "/categories", Some(json!({ "name": "Velg" })))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["id"], category.id);
}

#[tokio::test]
async fn product_create_validates_input_and_records_opening_stock() {
    let app = TestApp::new().await;
    let category = app.seed_category("Aki").await;

    let response = app
        .as_admin(
            Method::POST,
            "/products",
            Some(json!({
                "name": "Aki GS 5Ah",
                "stock": 8,
                "price": "275000.00",
                "location": "Rak C3",
                "category_id": category.id
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let id = body["id"].as_i64().unwrap() as i32;
    assert_eq!(body["stock"], 8);

    let response = app
        .as_employee(Method::GET, &format!("/products/{}/stock-ledger", id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let ledger = body_json(response).await;
    assert_eq!(ledger["total"], 1);
    assert_eq!(ledger["data"][0]["change_quantity"], 8);
    assert_eq!(ledger["data"][0]["note"], INITIAL_STOCK_NOTE);

    let bad_requests = [
        (
            json!({ "name": "X", "stock": -1, "price": "1", "location": "A", "category_id": category.id }),
            "validation_error",
        ),
        (
            json!({ "name": "X", "price": "-5", "location": "A", "category_id": category.id }),
            "validation_error",
        ),
        (
            json!({ "name": "X", "price": "5", "location": "A", "category_id": 9999 }),
            "invalid_category",
        ),
    ];
    for (payload, kind) in bad_requests {
        let response = app
            .as_admin(Method::POST, "/products", Some(payload.clone()))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", payload);
        assert_eq!(body_json(response).await["kind"], kind, "{}", payload);
    }
}

#[tokio::test]
async fn employee_cannot_change_the_catalog() {
    let app = TestApp::new().await;
    let category = app.seed_category("Body").await;

    let response = app
        .as_employee(
            Method::POST,
            "/products",
            Some(json!({ "name": "Cover body", "price": "150000", "location": "Gudang", "category_id": category.id })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .as_employee(Method::DELETE, &format!("/categories/{}", category.id), None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn price_history_is_appended_only_when_price_changes() {
    let app = TestApp::new().await;
    let category = app.seed_category("Shock").await;
    let product = app.seed_product("Shock belakang", 2, dec!(300000), category.id).await;
    let products = app.state.services.products.clone();

    products
        .update(product.id, update_input("Shock belakang YSS", dec!(300000), category.id))
        .await
        .unwrap();
    assert_eq!(price_history_count(&app, product.id).await, 0);

    let updated = products
        .update(product.id, update_input("Shock belakang YSS", dec!(325000), category.id))
        .await
        .unwrap();
    assert_eq!(updated.price, dec!(325000));
    assert_eq!(updated.stock, 2);
    assert_eq!(price_history_count(&app, product.id).await, 1);

    products
        .update(product.id, update_input("Shock belakang YSS", dec!(310000), category.id))
        .await
        .unwrap();

    let response = app
        .as_employee(
            Method::GET,
            &format!("/products/{}/price-history", product.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let history = body_json(response).await;
    let rows = history.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    let newest_old = Decimal::from_str(rows[0]["old_price"].as_str().unwrap()).unwrap();
    let newest_new = Decimal::from_str(rows[0]["new_price"].as_str().unwrap()).unwrap();
    assert_eq!(newest_old, dec!(325000));
    assert_eq!(newest_new, dec!(310000));
}

#[tokio::test]
async fn update_to_missing_category_is_rejected_without_side_effects() {
    let app = TestApp::new().await;
    let category = app.seed_category("Jok").await;
    let product = app.seed_product("Jok custom", 1, dec!(500000), category.id).await;

    let result = app
        .state
        .services
        .products
        .update(product.id, update_input("Jok custom", dec!(450000), 777))
        .await;
    assert_matches!(result, Err(ServiceError::InvalidCategory(777)));
    assert_eq!(price_history_count(&app, product.id).await, 0);

    let current = app.state.services.products.get(product.id).await.unwrap();
    assert_eq!(current.price, dec!(500000));
}

#[tokio::test]
async fn products_can_be_filtered_by_category_and_paginated() {
    let app = TestApp::new().await;
    let brakes = app.seed_category("Rem").await;
    let lights = app.seed_category("Lampu").await;
    for i in 0..3 {
        app.seed_product(&format!("Kampas {}", i), 1, dec!(10000), brakes.id)
            .await;
    }
    app.seed_product("Lampu sein", 1, dec!(15000), lights.id).await;

    let response = app
        .as_employee(
            Method::GET,
            &format!("/products?category_id={}&limit=2&page=2", brakes.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["total_pages"], 2);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let response = app
        .as_employee(Method::GET, "/products?page=abc", None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["kind"], "validation_error");
}

#[tokio::test]
async fn deleted_product_is_hidden() {
    let app = TestApp::new().await;
    let category = app.seed_category("Footstep").await;
    let product = app.seed_product("Footstep belakang", 0, dec!(65000), category.id).await;

    let response = app
        .as_admin(Method::DELETE, &format!("/products/{}", product.id), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .as_employee(Method::GET, &format!("/products/{}", product.id), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rename_can_take_the_name_of_a_deleted_category() {
    let app = TestApp::new().await;
    let retired = app.seed_category("Velg").await;
    app.state.services.categories.delete(retired.id).await.unwrap();
    let tires = app.seed_category("Ban").await;

    let response = app
        .as_admin(
            Method::PUT,
            &format!("/categories/{}", tires.id),
            Some(json!({ "name": "Velg" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], tires.id);
    assert_eq!(body["name"], "Velg");

    let response = app
        .as_admin(Method::POST, "/categories", Some(json!({ "name": "Velg" })))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let live = app.seed_category("Lampu").await;
    let response = app
        .as_admin(
            Method::PUT,
            &format!("/categories/{}", live.id),
            Some(json!({ "name": "Velg" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
