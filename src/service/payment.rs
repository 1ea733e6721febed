//! Payment creation and provider callback reconciliation.

use chrono::Utc;
use std::str::FromStr;
use tracing::{debug, error, info, warn};

use super::{Result, ServiceError};
use crate::domain::{OrderStatus, Payment, PaymentCallback, PaymentMethod, PaymentStatus};
use crate::gateway::{CallbackFields, Gateways, PaymentGateway};
use crate::storage::{self, SqliteStorage};

/// PaymentService links orders to payment attempts and applies provider
/// callbacks back onto payments and orders.
#[derive(Clone)]
pub struct PaymentService {
    storage: SqliteStorage,
    gateways: Gateways,
}

impl PaymentService {
    pub fn new(storage: SqliteStorage, gateways: Gateways) -> Self {
        Self { storage, gateways }
    }

    fn gateway(&self, method: &str) -> Result<(PaymentMethod, &dyn PaymentGateway)> {
        let unsupported = || ServiceError::UnsupportedPaymentMethod(method.to_string());

        let method = PaymentMethod::from_str(method).map_err(|_| unsupported())?;
        let gateway = self.gateways.get(method).ok_or_else(unsupported)?;
        Ok((method, gateway))
    }

    /// Records a pending payment for a pending order and asks the provider
    /// for the URL the buyer pays with.
    ///
    /// If the provider call fails the payment row stays pending; a retry
    /// creates a fresh attempt.
    pub async fn create_payment(&self, order_id: i64, method: &str) -> Result<(Payment, String)> {
        let (method, gateway) = self.gateway(method)?;

        let mut tx = self.storage.begin().await?;

        let order = storage::get_order(&mut tx, order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {}", order_id)))?;

        if order.status != OrderStatus::Pending {
            return Err(ServiceError::InvalidOrderStatus(format!(
                "order {} is {}, payment requires pending",
                order_id, order.status
            )));
        }

        let payment =
            storage::insert_payment(&mut tx, order_id, method, order.total_amount, Utc::now())
                .await?;
        tx.commit().await?;

        let url = gateway
            .create_payment(payment.id, payment.amount, &order.order_number)
            .await
            .map_err(|e| {
                warn!(
                    payment_id = payment.id,
                    order_id,
                    method = %method,
                    error = %e,
                    "provider rejected payment creation"
                );
                ServiceError::from(e)
            })?;

        info!(
            payment_id = payment.id,
            order_id,
            method = %method,
            amount = %payment.amount,
            "payment created"
        );

        Ok((payment, url))
    }

    /// Verifies a provider callback and applies it.
    ///
    /// The payment update, the audit record and (for paid callbacks) the
    /// order transition commit together. Redelivery rewrites the same status
    /// and appends another audit record; a paid payment is never downgraded.
    ///
    /// A paid callback for a cancelled order is still recorded, then reported
    /// as `InvalidOrderStatus`. A reported amount that differs from the
    /// payment's is rejected without writing anything.
    pub async fn handle_callback(&self, method: &str, fields: &CallbackFields) -> Result<Payment> {
        let (method, gateway) = self.gateway(method)?;

        let raw = gateway.serialize_callback(fields);
        let outcome = gateway.verify_callback(fields).map_err(|e| {
            warn!(method = %method, error = %e, "callback verification failed");
            ServiceError::from(e)
        })?;

        debug!(
            payment_id = outcome.payment_id,
            trade_no = %outcome.trade_no,
            status = %outcome.status,
            "callback verified"
        );

        let now = Utc::now();
        let mut tx = self.storage.begin().await?;

        // Write first so the transaction holds the write lock before it reads.
        let applied = storage::apply_payment_status(
            &mut tx,
            outcome.payment_id,
            outcome.status,
            &outcome.trade_no,
            now,
        )
        .await?;

        let payment = storage::get_payment(&mut tx, outcome.payment_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("payment {}", outcome.payment_id)))?;

        if payment.method != method {
            return Err(ServiceError::MalformedCallback(format!(
                "payment {} was not made with {}",
                payment.id, method
            )));
        }

        if outcome.amount != payment.amount {
            warn!(
                payment_id = payment.id,
                expected = %payment.amount,
                reported = %outcome.amount,
                "callback amount mismatch"
            );
            return Err(ServiceError::MalformedCallback(format!(
                "payment {} amount is {}, callback reports {}",
                payment.id, payment.amount, outcome.amount
            )));
        }

        storage::insert_callback(
            &mut tx,
            payment.id,
            &outcome.trade_no,
            outcome.status,
            &raw,
            now,
        )
        .await?;

        if !applied {
            tx.commit().await?;
            warn!(
                payment_id = payment.id,
                current = %payment.status,
                reported = %outcome.status,
                "callback ignored, payment already settled"
            );
            return Ok(payment);
        }

        let mut cancelled = false;
        if outcome.status == PaymentStatus::Paid
            && !storage::mark_order_paid(&mut tx, payment.order_id, now).await?
        {
            let order = storage::get_order(&mut tx, payment.order_id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("order {}", payment.order_id)))?;
            cancelled = order.status == OrderStatus::Cancelled;
            if !cancelled {
                debug!(order_id = order.id, status = %order.status, "order already past pending");
            }
        }

        tx.commit().await?;

        // The capture stays recorded; the caller has to refund or reopen.
        if cancelled {
            error!(
                payment_id = payment.id,
                order_id = payment.order_id,
                trade_no = %outcome.trade_no,
                amount = %payment.amount,
                "payment captured for a cancelled order"
            );
            return Err(ServiceError::InvalidOrderStatus(format!(
                "order {} is cancelled but payment {} was captured",
                payment.order_id, payment.id
            )));
        }

        info!(
            payment_id = payment.id,
            order_id = payment.order_id,
            trade_no = %outcome.trade_no,
            status = %payment.status,
            "payment callback applied"
        );

        Ok(payment)
    }

    /// Current status of a payment.
    pub async fn query_payment_status(&self, payment_id: i64) -> Result<PaymentStatus> {
        Ok(self.get_payment(payment_id).await?.status)
    }

    pub async fn get_payment(&self, payment_id: i64) -> Result<Payment> {
        let mut conn = self.storage.acquire().await?;

        storage::get_payment(&mut conn, payment_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("payment {}", payment_id)))
    }

    /// Latest payment attempt of an order.
    pub async fn get_payment_by_order(&self, order_id: i64) -> Result<Payment> {
        let mut conn = self.storage.acquire().await?;

        storage::get_latest_payment_by_order(&mut conn, order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("payment for order {}", order_id)))
    }

    /// Audit records of a payment in arrival order.
    pub async fn list_callbacks(&self, payment_id: i64) -> Result<Vec<PaymentCallback>> {
        let mut conn = self.storage.acquire().await?;

        if storage::get_payment(&mut conn, payment_id).await?.is_none() {
            return Err(ServiceError::NotFound(format!("payment {}", payment_id)));
        }

        Ok(storage::list_callbacks(&mut conn, payment_id).await?)
    }
}
