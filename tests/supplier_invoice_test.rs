mod common;

use assert_matches::assert_matches;
use chrono::{Datelike, NaiveDate, Utc};
use rstest::rstest;
use rust_decimal_macros::dec;

use procure_pay::entities::SupplierInvoiceStatus;
use procure_pay::errors::ErrorKind;
use procure_pay::events::AuditAction;
use procure_pay::services::goods_receipts::{ReceiptLineInput, ReceiveGoods};
use procure_pay::services::supplier_invoices::{InvoiceEdits, SetInvoiceStatus};
use procure_pay::ServiceError;

use common::TestApp;

fn posted() -> SetInvoiceStatus {
    SetInvoiceStatus::new(SupplierInvoiceStatus::Posted)
}

#[tokio::test]
async fn invoice_mirrors_the_order() {
    let app = TestApp::new().await;
    let confirmation = app
        .confirmed_order(&[
            ("Bolts", dec!(10), dec!(1.25), dec!(20)),
            ("Nuts", dec!(3), dec!(3.99), dec!(5.5)),
        ])
        .await;
    let outcome = app.receive_all(&confirmation).await;

    let detail = app
        .services
        .supplier_invoices
        .create_from_receipt(
            &app.owner(),
            outcome.goods_receipt_id,
            InvoiceEdits {
                supplier_number: Some("  F-2024-118 ".into()),
                invoice_date: NaiveDate::from_ymd_opt(2024, 6, 1),
                due_date: NaiveDate::from_ymd_opt(2024, 7, 1),
                ..Default::default()
            },
        )
        .await
        .expect("draft invoice");

    let order = app
        .services
        .purchase_orders
        .get(&app.owner(), confirmation.purchase_order.id)
        .await
        .expect("order");

    assert_eq!(detail.invoice.status, SupplierInvoiceStatus::Draft);
    assert_eq!(detail.invoice.number, None);
    assert_eq!(detail.invoice.supplier_number.as_deref(), Some("F-2024-118"));
    assert_eq!(detail.invoice.total_ttc, order.purchase_order.total_ttc);
    assert_eq!(detail.invoice.total_ttc, dec!(27.63));
    assert_eq!(detail.lines.len(), order.lines.len());
    for (invoice_line, order_line) in detail.lines.iter().zip(order.lines.iter()) {
        assert_eq!(invoice_line.purchase_order_line_id, order_line.id);
        assert_eq!(invoice_line.quantity, order_line.quantity);
        assert_eq!(invoice_line.unit_price, order_line.unit_price);
        assert_eq!(invoice_line.total_ttc, order_line.total_ttc);
    }
    assert_eq!(detail.balance_due, dec!(27.63));
}

#[tokio::test]
async fn one_invoice_per_order() {
    let app = TestApp::new().await;
    let confirmation = app
        .confirmed_order(&[("Widget", dec!(2), dec!(10), dec!(0))])
        .await;
    let outcome = app.receive_all(&confirmation).await;

    app.services
        .supplier_invoices
        .create_from_receipt(&app.owner(), outcome.goods_receipt_id, InvoiceEdits::default())
        .await
        .expect("first invoice");

    let err = app
        .services
        .supplier_invoices
        .create_from_receipt(&app.owner(), outcome.goods_receipt_id, InvoiceEdits::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(err.to_string().contains("one invoice per order"));
}

#[tokio::test]
async fn partially_received_orders_cannot_be_invoiced() {
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
    app.services
        .goods_receipts
        .receive(
            &app.owner(),
            order.purchase_order.id,
            ReceiveGoods {
                lines: vec![ReceiptLineInput {
                    purchase_order_line_id: order.lines[0].id,
                    quantity: dec!(4),
                }],
                note: None,
            },
        )
        .await
        .expect("partial lot");

    let err = app
        .services
        .supplier_invoices
        .create_from_receipt(
            &app.owner(),
            confirmation.goods_receipt.id,
            InvoiceEdits::default(),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::StateConflict(_));
}

#[tokio::test]
async fn posting_requires_an_attachment() {
    let app = TestApp::new().await;
    let draft = app.draft_invoice(dec!(2), dec!(50)).await;

    let err = app
        .services
        .supplier_invoices
        .set_status(&app.owner(), draft.invoice.id, posted())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(msg) if msg.contains("attachment required"));

    let invoice = app
        .services
        .supplier_invoices
        .set_status(
            &app.owner(),
            draft.invoice.id,
            posted().with_attachment("bills/2024/118.pdf"),
        )
        .await
        .expect("post with attachment");

    let year = Utc::now().year();
    assert_eq!(invoice.status, SupplierInvoiceStatus::Posted);
    assert_eq!(invoice.number, Some(format!("SINV-{}-0001", year)));
    assert_eq!(invoice.attachment_ref.as_deref(), Some("bills/2024/118.pdf"));
    assert!(invoice.posted_at.is_some());
    assert_eq!(app.audit.count(AuditAction::SupplierInvoicePosted), 1);
}

#[tokio::test]
async fn numbers_are_sequential_per_tenant() {
    let app = TestApp::new().await;
    let first = app.posted_invoice(dec!(1), dec!(10)).await;
    let second = app.posted_invoice(dec!(1), dec!(20)).await;

    let year = Utc::now().year();
    let number = |id| {
        let services = app.services.supplier_invoices.clone();
        let ctx = app.owner();
        async move {
            services
                .get(&ctx, id)
                .await
                .expect("invoice")
                .invoice
                .number
                .expect("numbered")
        }
    };
    assert_eq!(number(first).await, format!("SINV-{}-0001", year));
    assert_eq!(number(second).await, format!("SINV-{}-0002", year));
}

#[tokio::test]
async fn edits_apply_before_posting() {
    let app = TestApp::new().await;
    let draft = app.draft_invoice(dec!(1), dec!(10)).await;

    let mut request = posted().with_attachment("bills/7.pdf");
    request.edits.supplier_number = Some("SUP-7".into());
    request.edits.note = Some("checked against delivery note".into());

    let invoice = app
        .services
        .supplier_invoices
        .set_status(&app.owner(), draft.invoice.id, request)
        .await
        .expect("post");
    assert_eq!(invoice.supplier_number.as_deref(), Some("SUP-7"));
    assert_eq!(invoice.note.as_deref(), Some("checked against delivery note"));
}

#[rstest]
#[case::draft_to_posted(None, SupplierInvoiceStatus::Posted, None)]
#[case::draft_to_cancelled(None, SupplierInvoiceStatus::Cancelled, None)]
#[case::draft_to_paid(None, SupplierInvoiceStatus::Paid, Some(ErrorKind::StateConflict))]
#[case::draft_to_draft(None, SupplierInvoiceStatus::Draft, Some(ErrorKind::StateConflict))]
#[case::posted_to_cancelled(
    Some(SupplierInvoiceStatus::Posted),
    SupplierInvoiceStatus::Cancelled,
    Some(ErrorKind::StateConflict)
)]
#[case::posted_to_posted(
    Some(SupplierInvoiceStatus::Posted),
    SupplierInvoiceStatus::Posted,
    Some(ErrorKind::StateConflict)
)]
#[case::cancelled_to_posted(
    Some(SupplierInvoiceStatus::Cancelled),
    SupplierInvoiceStatus::Posted,
    Some(ErrorKind::StateConflict)
)]
#[tokio::test]
async fn status_transitions(
    #[case] setup: Option<SupplierInvoiceStatus>,
    #[case] target: SupplierInvoiceStatus,
    #[case] expected: Option<ErrorKind>,
) {
    let app = TestApp::new().await;
    let draft = app.draft_invoice(dec!(1), dec!(10)).await;
    let ctx = app.owner();

    if let Some(status) = setup {
        app.services
            .supplier_invoices
            .set_status(
                &ctx,
                draft.invoice.id,
                SetInvoiceStatus::new(status).with_attachment("bills/setup.pdf"),
            )
            .await
            .expect("setup transition");
    }

    let result = app
        .services
        .supplier_invoices
        .set_status(
            &ctx,
            draft.invoice.id,
            SetInvoiceStatus::new(target).with_attachment("bills/scan.pdf"),
        )
        .await;

    match expected {
        None => assert_eq!(result.expect("transition").status, target),
        Some(kind) => assert_eq!(result.unwrap_err().kind(), kind),
    }
}

#[tokio::test]
async fn only_elevated_roles_post_or_cancel() {
    let app = TestApp::new().await;
    let draft = app.draft_invoice(dec!(1), dec!(10)).await;

    for request in [
        posted().with_attachment("bills/1.pdf"),
        SetInvoiceStatus::new(SupplierInvoiceStatus::Cancelled),
    ] {
        let err = app
            .services
            .supplier_invoices
            .set_status(&app.member(), draft.invoice.id, request)
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::Forbidden(_));
    }

    let still = app
        .services
        .supplier_invoices
        .get(&app.member(), draft.invoice.id)
        .await
        .expect("members may read");
    assert_eq!(still.invoice.status, SupplierInvoiceStatus::Draft);
}
