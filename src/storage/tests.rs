//! Tests for the SQLite data access functions.

use super::*;
use crate::domain::{LogisticsStatus, LogisticsUpdate, OrderStatus, PaymentMethod, PaymentStatus};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

async fn seeded_order(storage: &SqliteStorage) -> i64 {
    let mut conn = storage.acquire().await.unwrap();
    let address = insert_address(&mut conn, 1, "Ann", "555-0100", "1 Main St")
        .await
        .unwrap();
    insert_order(
        &mut conn,
        &NewOrder {
            user_id: 1,
            order_number: "ORD20240101000000001".into(),
            total_amount: dec("12.50"),
            address_id: address.id,
            created_at: Utc::now(),
        },
    )
    .await
    .unwrap()
}

// ==================== Inventory tests ====================

#[tokio::test]
async fn test_reserve_stock_decrements_and_counts_sales() {
    let storage = SqliteStorage::in_memory().await.unwrap();
    let mut conn = storage.acquire().await.unwrap();

    let product = insert_product(&mut conn, "Mug", dec("9.90"), 5).await.unwrap();
    assert!(reserve_stock(&mut conn, product.id, 3).await.unwrap());

    let after = get_product(&mut conn, product.id).await.unwrap().unwrap();
    assert_eq!(after.stock, 2);
    assert_eq!(after.sales, 3);
    assert_eq!(after.price, dec("9.90"));
}

#[tokio::test]
async fn test_reserve_stock_refuses_oversell() {
    let storage = SqliteStorage::in_memory().await.unwrap();
    let mut conn = storage.acquire().await.unwrap();

    let product = insert_product(&mut conn, "Mug", dec("9.90"), 2).await.unwrap();
    assert!(!reserve_stock(&mut conn, product.id, 3).await.unwrap());

    let after = get_product(&mut conn, product.id).await.unwrap().unwrap();
    assert_eq!(after.stock, 2);
    assert_eq!(after.sales, 0);
}

#[tokio::test]
async fn test_reserve_stock_unknown_product() {
    let storage = SqliteStorage::in_memory().await.unwrap();
    let mut conn = storage.acquire().await.unwrap();

    assert!(!reserve_stock(&mut conn, 404, 1).await.unwrap());
}

#[tokio::test]
async fn test_insert_product_rejects_negative_stock() {
    let storage = SqliteStorage::in_memory().await.unwrap();
    let mut conn = storage.acquire().await.unwrap();

    let result = insert_product(&mut conn, "Mug", dec("1"), -1).await;
    assert!(matches!(result, Err(StorageError::InvalidData(_))));
}

// ==================== Cart tests ====================

#[tokio::test]
async fn test_cart_merges_quantities_and_tracks_selection() {
    let storage = SqliteStorage::in_memory().await.unwrap();
    let mut conn = storage.acquire().await.unwrap();

    let a = insert_product(&mut conn, "A", dec("1.00"), 10).await.unwrap();
    let b = insert_product(&mut conn, "B", dec("2.00"), 10).await.unwrap();

    add_cart_item(&mut conn, 7, a.id, 1).await.unwrap();
    let merged = add_cart_item(&mut conn, 7, a.id, 2).await.unwrap();
    assert_eq!(merged.quantity, 3);

    add_cart_item(&mut conn, 7, b.id, 1).await.unwrap();
    assert!(set_cart_item_selected(&mut conn, 7, b.id, false).await.unwrap());
    assert!(!set_cart_item_selected(&mut conn, 8, b.id, false).await.unwrap());

    assert_eq!(list_cart(&mut conn, 7).await.unwrap().len(), 2);

    let selected = selected_cart_items(&mut conn, 7).await.unwrap();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].product_id, a.id);

    assert_eq!(clear_cart(&mut conn, 7).await.unwrap(), 2);
    assert!(list_cart(&mut conn, 7).await.unwrap().is_empty());
}

// ==================== Order tests ====================

#[tokio::test]
async fn test_order_round_trip_with_items() {
    let storage = SqliteStorage::in_memory().await.unwrap();
    let order_id = seeded_order(&storage).await;
    let mut conn = storage.acquire().await.unwrap();

    let product = insert_product(&mut conn, "Pen", dec("2.50"), 10).await.unwrap();
    insert_order_item(&mut conn, order_id, product.id, 5, dec("2.50"))
        .await
        .unwrap();

    let order = get_order(&mut conn, order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, dec("12.50"));
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items_total(), order.total_amount);
    assert!(order.payment_time.is_none());
}

#[tokio::test]
async fn test_mark_order_paid_only_from_pending() {
    let storage = SqliteStorage::in_memory().await.unwrap();
    let order_id = seeded_order(&storage).await;
    let mut conn = storage.acquire().await.unwrap();

    assert!(mark_order_paid(&mut conn, order_id, Utc::now()).await.unwrap());
    assert!(!mark_order_paid(&mut conn, order_id, Utc::now()).await.unwrap());

    let order = get_order(&mut conn, order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert!(order.payment_time.is_some());
}

#[tokio::test]
async fn test_update_order_status_missing_order() {
    let storage = SqliteStorage::in_memory().await.unwrap();
    let mut conn = storage.acquire().await.unwrap();

    assert!(!update_order_status(&mut conn, 99, OrderStatus::Paid).await.unwrap());
}

// ==================== Logistics tests ====================

#[tokio::test]
async fn test_traces_are_returned_newest_first() {
    let storage = SqliteStorage::in_memory().await.unwrap();
    let order_id = seeded_order(&storage).await;
    let mut conn = storage.acquire().await.unwrap();

    let now = Utc::now();
    let logistics_id = insert_logistics(
        &mut conn,
        order_id,
        &LogisticsUpdate::new("", "", LogisticsStatus::Pending),
        now,
    )
    .await
    .unwrap();

    let older = now - Duration::hours(2);
    insert_trace(&mut conn, logistics_id, "Hub A", &LogisticsStatus::Processing, "x", older)
        .await
        .unwrap();
    insert_trace(&mut conn, logistics_id, "Hub B", &LogisticsStatus::Shipping, "y", now)
        .await
        .unwrap();

    let logistics = get_logistics_by_order(&mut conn, order_id).await.unwrap().unwrap();
    assert_eq!(logistics.id, logistics_id);
    assert_eq!(logistics.shipping_fee, Decimal::ZERO);
    assert_eq!(logistics.traces.len(), 2);
    assert_eq!(logistics.traces[0].location, "Hub B");
    assert_eq!(logistics.traces[1].location, "Hub A");
}

#[tokio::test]
async fn test_one_logistics_record_per_order() {
    let storage = SqliteStorage::in_memory().await.unwrap();
    let order_id = seeded_order(&storage).await;
    let mut conn = storage.acquire().await.unwrap();

    let fields = LogisticsUpdate::new("", "", LogisticsStatus::Pending);
    insert_logistics(&mut conn, order_id, &fields, Utc::now())
        .await
        .unwrap();

    let second = insert_logistics(&mut conn, order_id, &fields, Utc::now()).await;
    assert!(matches!(second, Err(StorageError::Database(_))));
}

// ==================== Payment tests ====================

#[tokio::test]
async fn test_apply_payment_status_sets_pay_time_once() {
    let storage = SqliteStorage::in_memory().await.unwrap();
    let order_id = seeded_order(&storage).await;
    let mut conn = storage.acquire().await.unwrap();

    let payment = insert_payment(&mut conn, order_id, PaymentMethod::Alipay, dec("12.50"), Utc::now())
        .await
        .unwrap();

    let first = Utc::now();
    assert!(apply_payment_status(&mut conn, payment.id, PaymentStatus::Paid, "T1", first)
        .await
        .unwrap());
    let paid = get_payment(&mut conn, payment.id).await.unwrap().unwrap();
    let pay_time = paid.pay_time.unwrap();

    let later = first + Duration::minutes(5);
    assert!(apply_payment_status(&mut conn, payment.id, PaymentStatus::Paid, "T1", later)
        .await
        .unwrap());
    let replayed = get_payment(&mut conn, payment.id).await.unwrap().unwrap();
    assert_eq!(replayed.pay_time, Some(pay_time));
    assert_eq!(replayed.trade_no.as_deref(), Some("T1"));
}

#[tokio::test]
async fn test_apply_payment_status_never_downgrades_paid() {
    let storage = SqliteStorage::in_memory().await.unwrap();
    let order_id = seeded_order(&storage).await;
    let mut conn = storage.acquire().await.unwrap();

    let payment = insert_payment(&mut conn, order_id, PaymentMethod::Wechat, dec("12.50"), Utc::now())
        .await
        .unwrap();
    apply_payment_status(&mut conn, payment.id, PaymentStatus::Paid, "T1", Utc::now())
        .await
        .unwrap();

    let refused = apply_payment_status(&mut conn, payment.id, PaymentStatus::Failed, "T1", Utc::now())
        .await
        .unwrap();
    assert!(!refused);

    let current = get_payment(&mut conn, payment.id).await.unwrap().unwrap();
    assert_eq!(current.status, PaymentStatus::Paid);
}

#[tokio::test]
async fn test_apply_payment_status_keeps_settled_trade_number() {
    let storage = SqliteStorage::in_memory().await.unwrap();
    let order_id = seeded_order(&storage).await;
    let mut conn = storage.acquire().await.unwrap();

    let payment = insert_payment(&mut conn, order_id, PaymentMethod::Alipay, dec("12.50"), Utc::now())
        .await
        .unwrap();
    assert!(apply_payment_status(&mut conn, payment.id, PaymentStatus::Paid, "T100", Utc::now())
        .await
        .unwrap());

    let swapped = apply_payment_status(&mut conn, payment.id, PaymentStatus::Paid, "T999", Utc::now())
        .await
        .unwrap();
    assert!(!swapped);

    let current = get_payment(&mut conn, payment.id).await.unwrap().unwrap();
    assert_eq!(current.status, PaymentStatus::Paid);
    assert_eq!(current.trade_no.as_deref(), Some("T100"));
}

#[tokio::test]
async fn test_trade_number_is_unique_across_payments() {
    let storage = SqliteStorage::in_memory().await.unwrap();
    let order_id = seeded_order(&storage).await;
    let mut conn = storage.acquire().await.unwrap();

    let first = insert_payment(&mut conn, order_id, PaymentMethod::Wechat, dec("1"), Utc::now())
        .await
        .unwrap();
    let second = insert_payment(&mut conn, order_id, PaymentMethod::Wechat, dec("1"), Utc::now())
        .await
        .unwrap();

    apply_payment_status(&mut conn, first.id, PaymentStatus::Paid, "DUP", Utc::now())
        .await
        .unwrap();
    let result = apply_payment_status(&mut conn, second.id, PaymentStatus::Paid, "DUP", Utc::now()).await;
    assert!(matches!(result, Err(StorageError::Database(_))));

    let latest = get_latest_payment_by_order(&mut conn, order_id).await.unwrap().unwrap();
    assert_eq!(latest.id, second.id);
}

#[tokio::test]
async fn test_callbacks_are_listed_in_arrival_order() {
    let storage = SqliteStorage::in_memory().await.unwrap();
    let order_id = seeded_order(&storage).await;
    let mut conn = storage.acquire().await.unwrap();

    let payment = insert_payment(&mut conn, order_id, PaymentMethod::Alipay, dec("1"), Utc::now())
        .await
        .unwrap();
    insert_callback(&mut conn, payment.id, "T1", PaymentStatus::Failed, "{}", Utc::now())
        .await
        .unwrap();
    insert_callback(&mut conn, payment.id, "T1", PaymentStatus::Paid, "{\"a\":1}", Utc::now())
        .await
        .unwrap();

    let callbacks = list_callbacks(&mut conn, payment.id).await.unwrap();
    assert_eq!(callbacks.len(), 2);
    assert_eq!(callbacks[0].status, PaymentStatus::Failed);
    assert_eq!(callbacks[1].raw_data, "{\"a\":1}");
}

// ==================== Transaction tests ====================

#[tokio::test]
async fn test_dropped_transaction_rolls_back() {
    let storage = SqliteStorage::in_memory().await.unwrap();
    let product_id = {
        let mut conn = storage.acquire().await.unwrap();
        insert_product(&mut conn, "Lamp", dec("30"), 4).await.unwrap().id
    };

    {
        let mut tx = storage.begin().await.unwrap();
        assert!(reserve_stock(&mut tx, product_id, 4).await.unwrap());
    }

    let mut conn = storage.acquire().await.unwrap();
    let product = get_product(&mut conn, product_id).await.unwrap().unwrap();
    assert_eq!(product.stock, 4);
}
