mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use uuid::Uuid;

use procure_pay::entities::{GoodsReceiptStatus, PurchaseOrderStatus};
use procure_pay::events::AuditAction;
use procure_pay::services::goods_receipts::{ReceiptLineInput, ReceiveGoods};
use procure_pay::services::purchase_orders::{CreatePurchaseOrder, OrderLineInput};
use procure_pay::ServiceError;

use common::TestApp;

fn lot(line: Uuid, quantity: rust_decimal::Decimal) -> ReceiveGoods {
    ReceiveGoods {
        lines: vec![ReceiptLineInput {
            purchase_order_line_id: line,
            quantity,
        }],
        note: None,
    }
}

#[tokio::test]
async fn partial_receipt_then_completion() {
    let app = TestApp::new().await;
    let ctx = app.owner();
    let confirmation = app
        .confirmed_order(&[("Widget", dec!(10), dec!(2.50), dec!(20))])
        .await;
    let po_id = confirmation.purchase_order.id;
    let line_id = app
        .services
        .purchase_orders
        .get(&ctx, po_id)
        .await
        .expect("order")
        .lines[0]
        .id;

    let first = app
        .services
        .goods_receipts
        .receive(&ctx, po_id, lot(line_id, dec!(4)))
        .await
        .expect("first lot");
    assert_eq!(first.status, GoodsReceiptStatus::Partial);
    assert_eq!(first.purchase_order_status, PurchaseOrderStatus::Confirmed);
    assert_eq!(first.sequence, 1);
    assert_eq!(first.lines[0].remaining, dec!(6));
    assert_eq!(first.goods_receipt_id, confirmation.goods_receipt.id);

    let second = app
        .services
        .goods_receipts
        .receive(&ctx, po_id, lot(line_id, dec!(6)))
        .await
        .expect("second lot");
    assert_eq!(second.status, GoodsReceiptStatus::Received);
    assert_eq!(second.purchase_order_status, PurchaseOrderStatus::Received);
    assert_eq!(second.sequence, 2);

    let order = app.services.purchase_orders.get(&ctx, po_id).await.expect("order");
    assert_eq!(order.purchase_order.status, PurchaseOrderStatus::Received);
    assert!(order.purchase_order.received_at.is_some());

    let err = app
        .services
        .goods_receipts
        .receive(&ctx, po_id, lot(line_id, dec!(1)))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::OverReceipt(lines) => {
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].ordered, dec!(10));
        assert_eq!(lines[0].already_received, dec!(10));
        assert_eq!(lines[0].requested, dec!(1));
    });

    let receipt = app
        .services
        .goods_receipts
        .find_by_purchase_order(&ctx, po_id)
        .await
        .expect("receipt");
    assert_eq!(receipt.entries.len(), 2);
    assert_eq!(receipt.goods_receipt.status, GoodsReceiptStatus::Received);
    assert_eq!(app.audit.count(AuditAction::PurchaseOrderReceived), 1);
    assert_eq!(app.audit.count(AuditAction::GoodsReceiptLotRecorded), 2);
}

#[tokio::test]
async fn rejected_lot_leaves_no_trace() {
    let app = TestApp::new().await;
    let ctx = app.owner();
    let confirmation = app
        .confirmed_order(&[
            ("Bolts", dec!(5), dec!(1), dec!(0)),
            ("Nuts", dec!(5), dec!(1), dec!(0)),
        ])
        .await;
    let po_id = confirmation.purchase_order.id;
    let lines = app
        .services
        .purchase_orders
        .get(&ctx, po_id)
        .await
        .expect("order")
        .lines;

    let err = app
        .services
        .goods_receipts
        .receive(
            &ctx,
            po_id,
            ReceiveGoods {
                lines: vec![
                    ReceiptLineInput {
                        purchase_order_line_id: lines[0].id,
                        quantity: dec!(3),
                    },
                    ReceiptLineInput {
                        purchase_order_line_id: lines[1].id,
                        quantity: dec!(7),
                    },
                ],
                note: Some("mixed pallet".into()),
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::OverReceipt(offending) => {
        assert_eq!(offending.len(), 1);
        assert_eq!(offending[0].purchase_order_line_id, lines[1].id);
    });
    assert_eq!(receipt_status(&app, po_id).await, GoodsReceiptStatus::NotReceived);

    let receipt = app
        .services
        .goods_receipts
        .get(&ctx, confirmation.goods_receipt.id)
        .await
        .expect("receipt");
    assert!(receipt.entries.is_empty());
    assert!(receipt.progress.iter().all(|p| p.received == dec!(0)));
    assert_eq!(app.audit.count(AuditAction::GoodsReceiptLotRecorded), 0);
}

async fn receipt_status(app: &TestApp, po_id: Uuid) -> GoodsReceiptStatus {
    app.services
        .goods_receipts
        .find_by_purchase_order(&app.owner(), po_id)
        .await
        .expect("receipt")
        .goods_receipt
        .status
}

#[tokio::test]
async fn unconfirmed_orders_cannot_receive() {
    let app = TestApp::new().await;
    let ctx = app.owner();
    let detail = app
        .services
        .purchase_orders
        .create(
            &ctx,
            CreatePurchaseOrder {
                supplier_name: "Acme".into(),
                note: None,
                lines: vec![OrderLineInput {
                    name: "Widget".into(),
                    quantity: dec!(2),
                    unit: None,
                    unit_price: dec!(3),
                    tax_rate: dec!(0),
                    rfq_line_id: None,
                }],
            },
        )
        .await
        .expect("create");

    let err = app
        .services
        .goods_receipts
        .receive(
            &ctx,
            detail.purchase_order.id,
            lot(detail.lines[0].id, dec!(1)),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::StateConflict(_));
}

#[tokio::test]
async fn other_tenants_see_not_found() {
    let app = TestApp::new().await;
    let confirmation = app
        .confirmed_order(&[("Widget", dec!(2), dec!(3), dec!(0))])
        .await;
    let stranger = app.stranger();

    let err = app
        .services
        .goods_receipts
        .receive(
            &stranger,
            confirmation.purchase_order.id,
            lot(Uuid::new_v4(), dec!(1)),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    let err = app
        .services
        .goods_receipts
        .get(&stranger, confirmation.goods_receipt.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn members_may_receive_goods() {
    let app = TestApp::new().await;
    let confirmation = app
        .confirmed_order(&[("Widget", dec!(2), dec!(3), dec!(0))])
        .await;
    let line_id = app
        .services
        .purchase_orders
        .get(&app.member(), confirmation.purchase_order.id)
        .await
        .expect("order")
        .lines[0]
        .id;

    let outcome = app
        .services
        .goods_receipts
        .receive(&app.member(), confirmation.purchase_order.id, lot(line_id, dec!(2)))
        .await
        .expect("member receives");
    assert_eq!(outcome.status, GoodsReceiptStatus::Received);
}

#[tokio::test]
async fn concurrent_lots_never_over_receive() {
    let app = TestApp::new().await;
    let confirmation = app
        .confirmed_order(&[("Widget", dec!(10), dec!(1), dec!(0))])
        .await;
    let po_id = confirmation.purchase_order.id;
    let line_id = app
        .services
        .purchase_orders
        .get(&app.owner(), po_id)
        .await
        .expect("order")
        .lines[0]
        .id;

    let (ctx_a, ctx_b) = (app.owner(), app.owner());
    let (a, b) = tokio::join!(
        app.services
            .goods_receipts
            .receive(&ctx_a, po_id, lot(line_id, dec!(6))),
        app.services
            .goods_receipts
            .receive(&ctx_b, po_id, lot(line_id, dec!(6))),
    );

    let accepted = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 1);
    assert!([a, b]
        .into_iter()
        .any(|r| matches!(r, Err(ServiceError::OverReceipt(_)))));

    let receipt = app
        .services
        .goods_receipts
        .find_by_purchase_order(&app.owner(), po_id)
        .await
        .expect("receipt");
    assert_eq!(receipt.progress[0].received, dec!(6));
    assert_eq!(receipt.goods_receipt.status, GoodsReceiptStatus::Partial);
}
