mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;

use procure_pay::entities::PaymentMethod;
use procure_pay::events::AuditAction;
use procure_pay::services::goods_receipts::{ReceiptLineInput, ReceiveGoods};
use procure_pay::services::supplier_payments::RecordPayment;
use procure_pay::ServiceError;

use common::TestApp;

#[tokio::test]
async fn retried_receive_replays_the_first_outcome() {
    let app = TestApp::new().await;
    let confirmation = app
        .confirmed_order(&[("Widget", dec!(10), dec!(1), dec!(0))])
        .await;
    let order = app
        .services
        .purchase_orders
        .get(&app.owner(), confirmation.purchase_order.id)
        .await
        .expect("order");
    let ctx = app.owner().with_idempotency_key("dock-7-lot-1");
    let lot = ReceiveGoods {
        lines: vec![ReceiptLineInput {
            purchase_order_line_id: order.lines[0].id,
            quantity: dec!(4),
        }],
        note: None,
    };

    let first = app
        .services
        .goods_receipts
        .receive(&ctx, order.purchase_order.id, lot.clone())
        .await
        .expect("first call");
    let second = app
        .services
        .goods_receipts
        .receive(&ctx, order.purchase_order.id, lot)
        .await
        .expect("retry");

    assert_eq!(first, second);
    let receipt = app
        .services
        .goods_receipts
        .get(&app.owner(), first.goods_receipt_id)
        .await
        .expect("receipt");
    assert_eq!(receipt.entries.len(), 1);
    assert_eq!(receipt.progress[0].received, dec!(4));
    assert_eq!(app.audit.count(AuditAction::GoodsReceiptLotRecorded), 1);
}

#[tokio::test]
async fn retried_payment_is_applied_once() {
    let app = TestApp::new().await;
    let invoice_id = app.posted_invoice(dec!(1), dec!(100)).await;
    let ctx = app.owner().with_idempotency_key("pay-2024-001");
    let payment = RecordPayment::new(dec!(25), PaymentMethod::Card);

    let first = app
        .services
        .supplier_payments
        .record(&ctx, invoice_id, payment.clone())
        .await
        .expect("first call");
    let second = app
        .services
        .supplier_payments
        .record(&ctx, invoice_id, payment)
        .await
        .expect("retry");

    assert_eq!(first.payment.id, second.payment.id);
    assert_eq!(first.payment.reference, second.payment.reference);
    let detail = app
        .services
        .supplier_invoices
        .get(&app.owner(), invoice_id)
        .await
        .expect("invoice");
    assert_eq!(detail.payments.len(), 1);
    assert_eq!(detail.invoice.amount_paid, dec!(25));
}

#[tokio::test]
async fn keys_are_scoped_per_action_and_tenant() {
    let app = TestApp::new().await;
    let confirmation = app
        .confirmed_order(&[("Widget", dec!(10), dec!(1), dec!(0))])
        .await;
    let po_id = confirmation.purchase_order.id;
    let ctx = app.owner().with_idempotency_key("shared-key");

    let dispatch = app
        .services
        .purchase_orders
        .send(&ctx, po_id, "orders@acme.example")
        .await
        .expect("send");
    let again = app
        .services
        .purchase_orders
        .send(&ctx, po_id, "orders@acme.example")
        .await
        .expect("replayed send");
    assert_eq!(dispatch, again);
    assert_eq!(app.dispatcher.purchase_orders().len(), 1);

    let order = app
        .services
        .purchase_orders
        .get(&app.owner(), po_id)
        .await
        .expect("order");
    let outcome = app
        .services
        .goods_receipts
        .receive(
            &ctx,
            po_id,
            ReceiveGoods {
                lines: vec![ReceiptLineInput {
                    purchase_order_line_id: order.lines[0].id,
                    quantity: dec!(10),
                }],
                note: None,
            },
        )
        .await
        .expect("same key, different action executes");
    assert_eq!(outcome.sequence, 1);

    let stranger = app.stranger().with_idempotency_key("shared-key");
    let err = app
        .services
        .purchase_orders
        .send(&stranger, po_id, "orders@acme.example")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn failures_are_not_stored() {
    let app = TestApp::new().await;
    let invoice_id = app.posted_invoice(dec!(1), dec!(50)).await;
    let ctx = app.owner().with_idempotency_key("pay-retry");

    let err = app
        .services
        .supplier_payments
        .record(&ctx, invoice_id, RecordPayment::new(dec!(80), PaymentMethod::Cheque))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let recorded = app
        .services
        .supplier_payments
        .record(&ctx, invoice_id, RecordPayment::new(dec!(50), PaymentMethod::Cheque))
        .await
        .expect("corrected retry executes");
    assert_eq!(recorded.amount_paid, dec!(50));
}

#[tokio::test]
async fn blank_keys_execute_every_time_and_long_keys_fail() {
    let app = TestApp::new().await;
    let confirmation = app
        .confirmed_order(&[("Widget", dec!(10), dec!(1), dec!(0))])
        .await;
    let po_id = confirmation.purchase_order.id;

    let blank = app.owner().with_idempotency_key("   ");
    for _ in 0..2 {
        app.services
            .purchase_orders
            .send(&blank, po_id, "orders@acme.example")
            .await
            .expect("send");
    }
    assert_eq!(app.dispatcher.purchase_orders().len(), 2);

    let long = app.owner().with_idempotency_key("k".repeat(256));
    let err = app
        .services
        .purchase_orders
        .send(&long, po_id, "orders@acme.example")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
    assert_eq!(app.dispatcher.purchase_orders().len(), 2);
}

#[tokio::test]
async fn invalid_recipients_are_rejected() {
    let app = TestApp::new().await;
    let confirmation = app
        .confirmed_order(&[("Widget", dec!(1), dec!(1), dec!(0))])
        .await;

    let err = app
        .services
        .purchase_orders
        .send(&app.owner(), confirmation.purchase_order.id, "not-an-address")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
    assert!(app.dispatcher.purchase_orders().is_empty());
}
