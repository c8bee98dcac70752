mod common;

use assert_matches::assert_matches;
use rstest::rstest;
use rust_decimal_macros::dec;
use uuid::Uuid;

use procure_pay::entities::PurchaseOrderStatus;
use procure_pay::services::purchase_orders::{CreatePurchaseOrder, OrderLineInput};
use procure_pay::{RequestContext, Role, ServiceError};

use common::TestApp;

fn single_line_order() -> CreatePurchaseOrder {
    CreatePurchaseOrder {
        supplier_name: "Acme".into(),
        note: Some("walk-in order".into()),
        lines: vec![OrderLineInput {
            name: "Widget".into(),
            quantity: dec!(3),
            unit: Some("pcs".into()),
            unit_price: dec!(4),
            tax_rate: dec!(10),
            rfq_line_id: None,
        }],
    }
}

#[rstest]
#[case::owner(Role::Owner, true)]
#[case::admin(Role::Admin, true)]
#[case::member(Role::Member, false)]
#[tokio::test]
async fn confirming_requires_an_elevated_role(#[case] role: Role, #[case] allowed: bool) {
    let app = TestApp::new().await;
    let creator = app.member();
    let detail = app
        .services
        .purchase_orders
        .create(&creator, single_line_order())
        .await
        .expect("members may create orders");
    assert_eq!(detail.purchase_order.total_ttc, dec!(13.20));

    let ctx = RequestContext::new(app.tenant_id, Uuid::new_v4(), role);
    let result = app
        .services
        .purchase_orders
        .confirm(&ctx, detail.purchase_order.id)
        .await;

    if allowed {
        let confirmation = result.expect("confirmed");
        assert_eq!(
            confirmation.purchase_order.status,
            PurchaseOrderStatus::Confirmed
        );
        assert_eq!(
            confirmation.goods_receipt.purchase_order_id,
            detail.purchase_order.id
        );
    } else {
        assert_matches!(result, Err(ServiceError::Forbidden(_)));
        let order = app
            .services
            .purchase_orders
            .get(&creator, detail.purchase_order.id)
            .await
            .expect("order");
        assert_eq!(order.purchase_order.status, PurchaseOrderStatus::Created);
        assert_eq!(order.goods_receipt_id, None);
    }
}

#[tokio::test]
async fn confirming_twice_is_a_state_conflict() {
    let app = TestApp::new().await;
    let confirmation = app
        .confirmed_order(&[("Widget", dec!(1), dec!(1), dec!(0))])
        .await;

    let err = app
        .services
        .purchase_orders
        .confirm(&app.owner(), confirmation.purchase_order.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::StateConflict(_));
}

#[tokio::test]
async fn invalid_order_lines_are_reported_not_dropped() {
    let app = TestApp::new().await;
    let mut input = single_line_order();
    input.lines[0].quantity = dec!(-1);

    let err = app
        .services
        .purchase_orders
        .create(&app.owner(), input)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(msg) if msg.starts_with("line 1"));
}
