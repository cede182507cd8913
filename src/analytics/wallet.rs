//! Financial rollups: cash position, inventory exposure, procurement
//! commitments, and the derived payout-pressure ratio.
//!
//! Arithmetic keeps full precision internally; only the final rollup values
//! are rounded to whole units so rounding error never compounds.

use serde::Serialize;

use super::records::{
    normalize_status, FinanceAttemptRecord, PaymentRecord, PurchaseOrderRecord, StockRecord,
};

#[derive(Debug, Clone, Default, Serialize)]
pub struct WalletResult {
    pub cash_in_captured: i64,
    pub cash_in_pending: i64,
    pub finance_disbursed_count: usize,
    pub finance_disbursed_amount: i64,
    pub inventory_available: usize,
    pub inventory_allocated: usize,
    pub inventory_sold: usize,
    pub inventory_value: i64,
    pub procurement_committed: i64,
    pub procurement_received_value: i64,
    pub procurement_pending_value: i64,
    /// May be negative: a genuine deficit signal, deliberately unclamped.
    pub net_cash_position: i64,
    /// `None` when captured cash is zero: "not computable" is distinct
    /// from 0% pressure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout_pressure_pct: Option<f64>,
}

pub fn compute_wallet(
    payments: &[PaymentRecord],
    finance_attempts: &[FinanceAttemptRecord],
    stock: &[StockRecord],
    purchase_orders: &[PurchaseOrderRecord],
) -> WalletResult {
    let mut captured = 0.0f64;
    let mut pending = 0.0f64;
    for payment in payments.iter().filter(|payment| !payment.is_deleted) {
        if payment.is_settled() {
            captured += payment.amount;
        } else {
            pending += payment.amount;
        }
    }

    let mut disbursed_count = 0usize;
    let mut disbursed_amount = 0.0f64;
    for attempt in finance_attempts
        .iter()
        .filter(|attempt| !attempt.is_deleted && attempt.is_disbursed())
    {
        disbursed_count += 1;
        disbursed_amount += attempt.loan_amount;
    }

    let mut available = 0usize;
    let mut allocated = 0usize;
    let mut sold = 0usize;
    let mut inventory_value = 0.0f64;
    for unit in stock.iter().filter(|unit| !unit.is_deleted) {
        let status = normalize_status(&unit.status);
        match status.as_str() {
            "AVAILABLE" => available += 1,
            "SOFT_LOCKED" | "HARD_LOCKED" => allocated += 1,
            "SOLD" => sold += 1,
            _ => {}
        }
        // Sold units recovered their capital; everything else is value at risk.
        if status != "SOLD" {
            inventory_value += unit.purchase_order_value.unwrap_or(0.0);
        }
    }

    let mut committed = 0.0f64;
    let mut received = 0.0f64;
    for order in purchase_orders.iter().filter(|order| !order.is_deleted) {
        committed += order.total_value;
        if order.is_received() {
            received += order.total_value;
        }
    }
    let procurement_pending = (committed - received).max(0.0);

    let payout_pressure_pct = if captured > 0.0 {
        Some((procurement_pending / captured * 1000.0).round() / 10.0)
    } else {
        None
    };

    WalletResult {
        cash_in_captured: captured.round() as i64,
        cash_in_pending: pending.round() as i64,
        finance_disbursed_count: disbursed_count,
        finance_disbursed_amount: disbursed_amount.round() as i64,
        inventory_available: available,
        inventory_allocated: allocated,
        inventory_sold: sold,
        inventory_value: inventory_value.round() as i64,
        procurement_committed: committed.round() as i64,
        procurement_received_value: received.round() as i64,
        procurement_pending_value: procurement_pending.round() as i64,
        net_cash_position: (captured - committed).round() as i64,
        payout_pressure_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(amount: f64, status: &str) -> PaymentRecord {
        PaymentRecord {
            amount,
            status: status.to_string(),
            ..PaymentRecord::default()
        }
    }

    fn order(total_value: f64, status: &str) -> PurchaseOrderRecord {
        PurchaseOrderRecord {
            total_value,
            status: status.to_string(),
            ..PurchaseOrderRecord::default()
        }
    }

    #[test]
    fn rollup_scenario() {
        let payments = vec![payment(1000.0, "PAID"), payment(500.0, "PENDING")];
        let orders = vec![order(2000.0, "RECEIVED"), order(800.0, "ISSUED")];

        let result = compute_wallet(&payments, &[], &[], &orders);

        assert_eq!(result.cash_in_captured, 1000);
        assert_eq!(result.cash_in_pending, 500);
        assert_eq!(result.procurement_committed, 2800);
        assert_eq!(result.procurement_received_value, 2000);
        assert_eq!(result.procurement_pending_value, 800);
        assert_eq!(result.net_cash_position, -1800);
        assert_eq!(result.payout_pressure_pct, Some(80.0));
    }

    #[test]
    fn procurement_pending_clamps_to_zero() {
        // Over-received: received exceeds committed after a data correction.
        let orders = vec![order(100.0, "RECEIVED"), order(-50.0, "ISSUED")];
        let result = compute_wallet(&[], &[], &[], &orders);
        assert_eq!(result.procurement_pending_value, 0);
    }

    #[test]
    fn payout_pressure_undefined_without_captured_cash() {
        let orders = vec![order(800.0, "ISSUED")];
        let result = compute_wallet(&[payment(0.0, "PAID")], &[], &[], &orders);
        assert_eq!(result.payout_pressure_pct, None);

        let no_payments = compute_wallet(&[], &[], &[], &orders);
        assert_eq!(no_payments.payout_pressure_pct, None);
    }

    #[test]
    fn payout_pressure_rounds_to_one_decimal() {
        let payments = vec![payment(3000.0, "CAPTURED")];
        let orders = vec![order(1000.0, "ISSUED")];
        let result = compute_wallet(&payments, &[], &[], &orders);
        assert_eq!(result.payout_pressure_pct, Some(33.3));
    }

    #[test]
    fn finance_counts_only_disbursed() {
        let attempts = vec![
            FinanceAttemptRecord {
                status: "DISBURSED".to_string(),
                loan_amount: 90000.0,
                ..FinanceAttemptRecord::default()
            },
            FinanceAttemptRecord {
                status: "APPROVED".to_string(),
                loan_amount: 50000.0,
                ..FinanceAttemptRecord::default()
            },
        ];
        let result = compute_wallet(&[], &attempts, &[], &[]);
        assert_eq!(result.finance_disbursed_count, 1);
        assert_eq!(result.finance_disbursed_amount, 90000);
    }

    #[test]
    fn sold_stock_excluded_from_inventory_value() {
        let stock = vec![
            StockRecord {
                status: "AVAILABLE".to_string(),
                purchase_order_value: Some(70000.0),
                ..StockRecord::default()
            },
            StockRecord {
                status: "soft_locked".to_string(),
                purchase_order_value: Some(65000.0),
                ..StockRecord::default()
            },
            StockRecord {
                status: "SOLD".to_string(),
                purchase_order_value: Some(68000.0),
                ..StockRecord::default()
            },
            StockRecord {
                status: "IN_TRANSIT".to_string(),
                purchase_order_value: None,
                ..StockRecord::default()
            },
        ];
        let result = compute_wallet(&[], &[], &stock, &[]);
        assert_eq!(result.inventory_available, 1);
        assert_eq!(result.inventory_allocated, 1);
        assert_eq!(result.inventory_sold, 1);
        assert_eq!(result.inventory_value, 135000);
    }

    #[test]
    fn deleted_rows_are_inert() {
        let mut deleted = payment(9999.0, "PAID");
        deleted.is_deleted = true;
        let result = compute_wallet(&[deleted, payment(100.0, "PAID")], &[], &[], &[]);
        assert_eq!(result.cash_in_captured, 100);
    }

    #[test]
    fn rounding_happens_only_at_the_boundary() {
        // Two 0.4 halves round to 1 when summed first, 0 if rounded early.
        let payments = vec![payment(0.4, "PAID"), payment(0.4, "PAID")];
        let result = compute_wallet(&payments, &[], &[], &[]);
        assert_eq!(result.cash_in_captured, 1);
    }
}
