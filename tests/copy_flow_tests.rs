mod common;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use polycopy::db::{accumulation_repo, order_repo, trade_repo};
use polycopy::engine::{copy_engine, order_manager, EngineConfig};
use polycopy::gateway::{VenueOrderState, VenueOrderStatus};
use polycopy::models::{OrderStatus, Side};

use common::{position, seed_config, setup_test_db, MockGateway};

const FOLLOWER: &str = "0xF0110WER00000000000000000000000000000001";
const TARGET: &str = "0xTARGET0000000000000000000000000000000001";

fn engine_config() -> EngineConfig {
    EngineConfig::default()
}

async fn backdate_order(pool: &sqlx::PgPool, order_id: uuid::Uuid, hours: i64) {
    sqlx::query("UPDATE pending_copy_orders SET created_at = $2 WHERE id = $1")
        .bind(order_id)
        .bind(Utc::now() - Duration::hours(hours))
        .execute(pool)
        .await
        .expect("Failed to backdate order");
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL postgres instance"]
async fn test_new_position_places_scaled_copy_order() {
    let pool = setup_test_db().await;
    let gateway = MockGateway::new();
    let config = engine_config();

    // 5% fraction: 100 shares at 0.60 copies as 5 shares ($3 — clears minimum)
    seed_config(&pool, FOLLOWER, TARGET, Decimal::new(5, 2)).await;
    gateway.set_positions(
        TARGET,
        vec![position("market_a", "token_a_yes", "YES", 100, Decimal::new(60, 2))],
    );

    copy_engine::monitor_positions(&pool, &gateway, &config)
        .await
        .expect("Monitoring tick should succeed");

    let placed = gateway.placed_orders.lock().unwrap().clone();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].token_id, "token_a_yes");
    assert_eq!(placed[0].side, Side::Buy);
    assert_eq!(placed[0].size, Decimal::from(5));
    assert_eq!(placed[0].price, Some(Decimal::new(60, 2)));

    let open = order_repo::get_open_orders(&pool).await.expect("query");
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].status, OrderStatus::Pending);
    assert_eq!(open[0].target_price, Decimal::new(60, 2));
    assert_eq!(open[0].current_quoted_price, Decimal::new(60, 2));

    // Second tick with unchanged positions: diff is empty, nothing new
    copy_engine::monitor_positions(&pool, &gateway, &config)
        .await
        .expect("Second tick should succeed");
    assert_eq!(gateway.placed_orders.lock().unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL postgres instance"]
async fn test_sub_minimum_copy_accumulates_then_folds() {
    let pool = setup_test_db().await;
    let gateway = MockGateway::new();
    let config = engine_config();

    // 1% fraction: 10 shares at 0.50 copies as $0.05 — below the $0.50 minimum
    seed_config(&pool, FOLLOWER, TARGET, Decimal::new(1, 2)).await;
    gateway.set_positions(
        TARGET,
        vec![position("market_a", "token_a_yes", "YES", 10, Decimal::new(50, 2))],
    );

    copy_engine::monitor_positions(&pool, &gateway, &config)
        .await
        .expect("First tick should succeed");

    assert!(gateway.placed_orders.lock().unwrap().is_empty());
    let entries = accumulation_repo::get_all_entries(&pool).await.expect("query");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].accumulated_size, Decimal::new(1, 1)); // 0.1 shares
    assert_eq!(entries[0].accumulated_value_usd, Decimal::new(5, 2)); // $0.05

    // Target buys 100 more: this copy alone is $0.50; with the carried
    // $0.05 the combined order goes out and the ledger row clears
    gateway.set_positions(
        TARGET,
        vec![position("market_a", "token_a_yes", "YES", 110, Decimal::new(50, 2))],
    );

    copy_engine::monitor_positions(&pool, &gateway, &config)
        .await
        .expect("Second tick should succeed");

    let placed = gateway.placed_orders.lock().unwrap().clone();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].size, Decimal::new(11, 1)); // 1.0 + carried 0.1

    let entries = accumulation_repo::get_all_entries(&pool).await.expect("query");
    assert!(entries.is_empty());
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL postgres instance"]
async fn test_transient_placement_failure_preserves_folded_total() {
    let pool = setup_test_db().await;
    let gateway = MockGateway::new();
    let config = engine_config();

    // 1% fraction: first event defers $0.05 to the ledger
    seed_config(&pool, FOLLOWER, TARGET, Decimal::new(1, 2)).await;
    gateway.set_positions(
        TARGET,
        vec![position("market_a", "token_a_yes", "YES", 10, Decimal::new(50, 2))],
    );
    copy_engine::monitor_positions(&pool, &gateway, &config)
        .await
        .expect("First tick should succeed");

    // Second event clears the minimum, but the venue times out: the
    // combined total must land back in the ledger, not vanish
    gateway.set_positions(
        TARGET,
        vec![position("market_a", "token_a_yes", "YES", 110, Decimal::new(50, 2))],
    );
    gateway.fail_next_places(1);
    copy_engine::monitor_positions(&pool, &gateway, &config)
        .await
        .expect("Tick isolates the placement failure");

    assert!(gateway.placed_orders.lock().unwrap().is_empty());
    let entries = accumulation_repo::get_all_entries(&pool).await.expect("query");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].accumulated_size, Decimal::new(11, 1)); // 1.1 shares
    assert_eq!(entries[0].accumulated_value_usd, Decimal::new(55, 2)); // $0.55

    // Venue recovers; the next event folds the stashed total in
    gateway.set_positions(
        TARGET,
        vec![position("market_a", "token_a_yes", "YES", 120, Decimal::new(50, 2))],
    );
    copy_engine::monitor_positions(&pool, &gateway, &config)
        .await
        .expect("Third tick should succeed");

    let placed = gateway.placed_orders.lock().unwrap().clone();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].size, Decimal::new(12, 1)); // every copied share survives
    assert!(accumulation_repo::get_all_entries(&pool).await.expect("query").is_empty());
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL postgres instance"]
async fn test_insufficient_balance_defers_combined_total() {
    let pool = setup_test_db().await;
    let gateway = MockGateway::new();
    let config = engine_config();

    seed_config(&pool, FOLLOWER, TARGET, Decimal::new(5, 2)).await;
    gateway.set_balance(Decimal::new(1, 0)); // $1 on hand
    gateway.set_positions(
        TARGET,
        vec![position("market_a", "token_a_yes", "YES", 100, Decimal::new(60, 2))],
    );

    // 5 shares at 0.60 needs $3: skipped, but the value is kept
    copy_engine::monitor_positions(&pool, &gateway, &config)
        .await
        .expect("Tick should succeed");

    assert!(gateway.placed_orders.lock().unwrap().is_empty());
    let entries = accumulation_repo::get_all_entries(&pool).await.expect("query");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].accumulated_value_usd, Decimal::from(3));

    // Funded again: the next event places the combined total
    gateway.set_balance(Decimal::from(100));
    gateway.set_positions(
        TARGET,
        vec![position("market_a", "token_a_yes", "YES", 120, Decimal::new(60, 2))],
    );
    copy_engine::monitor_positions(&pool, &gateway, &config)
        .await
        .expect("Tick should succeed");

    let placed = gateway.placed_orders.lock().unwrap().clone();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].size, Decimal::from(6)); // 5 stashed + 1 new
    assert!(accumulation_repo::get_all_entries(&pool).await.expect("query").is_empty());
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL postgres instance"]
async fn test_target_sell_cancels_stale_buy_and_copies_sell() {
    let pool = setup_test_db().await;
    let gateway = MockGateway::new();
    let config = engine_config();

    seed_config(&pool, FOLLOWER, TARGET, Decimal::new(5, 2)).await;
    gateway.set_positions(
        TARGET,
        vec![position("market_a", "token_a_yes", "YES", 200, Decimal::new(40, 2))],
    );

    copy_engine::monitor_positions(&pool, &gateway, &config)
        .await
        .expect("First tick should succeed");
    let buy_venue_id = gateway.placed_orders.lock().unwrap()[0].venue_order_id.clone();

    // Target halves the position: the resting BUY dies first, then the
    // SELL copy goes out at the old average entry
    gateway.set_positions(
        TARGET,
        vec![position("market_a", "token_a_yes", "YES", 100, Decimal::new(40, 2))],
    );

    copy_engine::monitor_positions(&pool, &gateway, &config)
        .await
        .expect("Second tick should succeed");

    assert!(gateway.cancelled.lock().unwrap().contains(&buy_venue_id));

    let placed = gateway.placed_orders.lock().unwrap().clone();
    assert_eq!(placed.len(), 2);
    assert_eq!(placed[1].side, Side::Sell);
    assert_eq!(placed[1].size, Decimal::from(5));
    assert_eq!(placed[1].price, Some(Decimal::new(40, 2)));
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL postgres instance"]
async fn test_fill_records_executed_trade_with_slippage() {
    let pool = setup_test_db().await;
    let gateway = MockGateway::new();
    let config = engine_config();

    seed_config(&pool, FOLLOWER, TARGET, Decimal::new(5, 2)).await;
    gateway.set_positions(
        TARGET,
        vec![position("market_a", "token_a_yes", "YES", 100, Decimal::new(60, 2))],
    );
    copy_engine::monitor_positions(&pool, &gateway, &config)
        .await
        .expect("Monitoring tick should succeed");

    let order = &order_repo::get_open_orders(&pool).await.expect("query")[0];
    let venue_id = order.venue_order_id.clone().expect("venue id");

    gateway.set_order_status(
        &venue_id,
        VenueOrderStatus {
            state: VenueOrderState::Filled,
            filled_size: Decimal::from(5),
            avg_fill_price: Some(Decimal::new(62, 2)),
        },
    );

    order_manager::manage_pending_orders(&pool, &gateway, &config, Utc::now())
        .await
        .expect("Management tick should succeed");

    assert!(order_repo::get_open_orders(&pool).await.expect("query").is_empty());

    let trades = trade_repo::get_recent_trades(&pool, FOLLOWER, 10).await.expect("query");
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].size, Decimal::from(5));
    assert_eq!(trades[0].fill_price, Decimal::new(62, 2));
    assert_eq!(trades[0].slippage, Decimal::new(2, 2)); // paid 0.62 vs target 0.60
    assert_eq!(trades[0].realized_pnl, Decimal::ZERO); // opening buy realizes nothing

    let pnl = trade_repo::pnl_by_target(&pool, FOLLOWER).await.expect("query");
    assert_eq!(pnl.len(), 1);
    assert_eq!(pnl[0].target_trader_address, TARGET);
    assert_eq!(pnl[0].trade_count, 1);
    assert_eq!(pnl[0].avg_slippage, Decimal::new(2, 2));
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL postgres instance"]
async fn test_partial_fill_requotes_remainder_and_keeps_fills() {
    let pool = setup_test_db().await;
    let gateway = MockGateway::new();
    let config = engine_config();

    seed_config(&pool, FOLLOWER, TARGET, Decimal::new(5, 2)).await;
    gateway.set_positions(
        TARGET,
        vec![position("market_a", "token_a_yes", "YES", 100, Decimal::new(60, 2))],
    );
    gateway.set_quote("token_a_yes", Decimal::new(60, 2), Decimal::new(62, 2));
    copy_engine::monitor_positions(&pool, &gateway, &config)
        .await
        .expect("Monitoring tick should succeed");

    let order = &order_repo::get_open_orders(&pool).await.expect("query")[0];
    let venue_id = order.venue_order_id.clone().expect("venue id");

    gateway.set_order_status(
        &venue_id,
        VenueOrderStatus {
            state: VenueOrderState::Open,
            filled_size: Decimal::from(2),
            avg_fill_price: Some(Decimal::new(60, 2)),
        },
    );

    order_manager::manage_pending_orders(&pool, &gateway, &config, Utc::now())
        .await
        .expect("Management tick should succeed");

    // Old venue order cancelled, remainder re-placed
    assert!(gateway.cancelled.lock().unwrap().contains(&venue_id));
    let placed = gateway.placed_orders.lock().unwrap().clone();
    assert_eq!(placed.len(), 2);
    assert_eq!(placed[1].size, Decimal::from(3));

    let open = order_repo::get_open_orders(&pool).await.expect("query");
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].status, OrderStatus::Partial);
    assert_eq!(open[0].filled_size, Decimal::from(2));
    assert_eq!(open[0].venue_order_id.as_deref(), Some(placed[1].venue_order_id.as_str()));
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL postgres instance"]
async fn test_venue_cancellation_keeps_partial_fills() {
    let pool = setup_test_db().await;
    let gateway = MockGateway::new();
    let config = engine_config();

    seed_config(&pool, FOLLOWER, TARGET, Decimal::new(5, 2)).await;
    gateway.set_positions(
        TARGET,
        vec![position("market_a", "token_a_yes", "YES", 100, Decimal::new(60, 2))],
    );
    copy_engine::monitor_positions(&pool, &gateway, &config)
        .await
        .expect("Monitoring tick should succeed");

    let order = &order_repo::get_open_orders(&pool).await.expect("query")[0];
    let venue_id = order.venue_order_id.clone().expect("venue id");

    // Venue kills the order after 2 of 5 shares matched
    gateway.set_order_status(
        &venue_id,
        VenueOrderStatus {
            state: VenueOrderState::Cancelled,
            filled_size: Decimal::from(2),
            avg_fill_price: Some(Decimal::new(60, 2)),
        },
    );

    order_manager::manage_pending_orders(&pool, &gateway, &config, Utc::now())
        .await
        .expect("Management tick should succeed");

    assert!(order_repo::get_open_orders(&pool).await.expect("query").is_empty());

    let (status, filled_size): (OrderStatus, Decimal) = sqlx::query_as(
        "SELECT status, filled_size FROM pending_copy_orders WHERE id = $1",
    )
    .bind(order.id)
    .fetch_one(&pool)
    .await
    .expect("query");
    assert_eq!(status, OrderStatus::Cancelled);
    assert_eq!(filled_size, Decimal::from(2));

    // The matched shares are recorded as an execution
    let trades = trade_repo::get_recent_trades(&pool, FOLLOWER, 10).await.expect("query");
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].size, Decimal::from(2));
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL postgres instance"]
async fn test_unfilled_order_converts_to_market_after_deadline() {
    let pool = setup_test_db().await;
    let gateway = MockGateway::new();
    let config = engine_config();

    seed_config(&pool, FOLLOWER, TARGET, Decimal::new(5, 2)).await;
    gateway.set_positions(
        TARGET,
        vec![position("market_a", "token_a_yes", "YES", 100, Decimal::new(60, 2))],
    );
    copy_engine::monitor_positions(&pool, &gateway, &config)
        .await
        .expect("Monitoring tick should succeed");

    let order = &order_repo::get_open_orders(&pool).await.expect("query")[0];
    let venue_id = order.venue_order_id.clone().expect("venue id");
    backdate_order(&pool, order.id, 37).await;

    order_manager::manage_pending_orders(&pool, &gateway, &config, Utc::now())
        .await
        .expect("Management tick should succeed");

    assert!(gateway.cancelled.lock().unwrap().contains(&venue_id));
    let placed = gateway.placed_orders.lock().unwrap().clone();
    assert_eq!(placed.len(), 2);
    assert_eq!(placed[1].price, None); // market order
    assert_eq!(placed[1].size, Decimal::from(5));

    // The logical order row survives the conversion, tracking the new venue order
    let open = order_repo::get_open_orders(&pool).await.expect("query");
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].venue_order_id.as_deref(), Some(placed[1].venue_order_id.as_str()));
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL postgres instance"]
async fn test_price_escalation_requotes_after_patient_window() {
    let pool = setup_test_db().await;
    let gateway = MockGateway::new();
    let config = engine_config();

    seed_config(&pool, FOLLOWER, TARGET, Decimal::new(5, 2)).await;
    gateway.set_positions(
        TARGET,
        vec![position("market_a", "token_a_yes", "YES", 100, Decimal::new(50, 2))],
    );
    // Wide book: 0.50 / 0.60 (spread ~18% of mid)
    gateway.set_quote("token_a_yes", Decimal::new(50, 2), Decimal::new(60, 2));
    copy_engine::monitor_positions(&pool, &gateway, &config)
        .await
        .expect("Monitoring tick should succeed");

    let order = &order_repo::get_open_orders(&pool).await.expect("query")[0];
    let venue_id = order.venue_order_id.clone().expect("venue id");
    backdate_order(&pool, order.id, 7).await;

    order_manager::manage_pending_orders(&pool, &gateway, &config, Utc::now())
        .await
        .expect("Management tick should succeed");

    // Past the patient window in a wide book the quote moves toward mid,
    // which is a material change, so the order is cancel-replaced
    assert!(gateway.cancelled.lock().unwrap().contains(&venue_id));
    let open = order_repo::get_open_orders(&pool).await.expect("query");
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].adjustment_count, 1);
    assert!(open[0].current_quoted_price > Decimal::new(50, 2));
    assert!(open[0].last_price_adjustment_at.is_some());
    // Target price is preserved for slippage accounting
    assert_eq!(open[0].target_price, Decimal::new(50, 2));
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL postgres instance"]
async fn test_disable_config_cancels_open_orders_for_pair() {
    let pool = setup_test_db().await;
    let gateway = MockGateway::new();
    let config = engine_config();

    let cfg = seed_config(&pool, FOLLOWER, TARGET, Decimal::new(5, 2)).await;
    gateway.set_positions(
        TARGET,
        vec![position("market_a", "token_a_yes", "YES", 100, Decimal::new(60, 2))],
    );
    copy_engine::monitor_positions(&pool, &gateway, &config)
        .await
        .expect("Monitoring tick should succeed");
    assert_eq!(order_repo::get_open_orders(&pool).await.expect("query").len(), 1);

    copy_engine::set_config_enabled(&pool, &gateway, cfg.id, false)
        .await
        .expect("Disable should succeed");

    assert!(order_repo::get_open_orders(&pool).await.expect("query").is_empty());
    assert_eq!(gateway.cancelled.lock().unwrap().len(), 1);

    // Disabled configs are not polled: a further change produces nothing
    gateway.set_positions(
        TARGET,
        vec![position("market_a", "token_a_yes", "YES", 500, Decimal::new(60, 2))],
    );
    copy_engine::monitor_positions(&pool, &gateway, &config)
        .await
        .expect("Tick with disabled config should succeed");
    assert_eq!(gateway.placed_orders.lock().unwrap().len(), 1);
}
