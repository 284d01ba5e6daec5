//! Full-run scenarios driven through `controller::run`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use autorent::config::SettlementConfig;
use autorent::engine::controller::{run, RunContext, RunOutcome, RunReport, RunRequest};
use autorent::types::{Algorithm, PoolConfig, RentError, SearchCriteria};

use crate::mock_platform::{rig, MockMarketplace, MockWallet};

fn request(speed: Decimal, max_price: Decimal, dry_run: bool) -> RunRequest {
    RunRequest {
        criteria: SearchCriteria {
            algorithm: Algorithm::X11,
            speed_mhs: speed,
            duration_hours: 3,
            max_price,
        },
        pool: PoolConfig {
            url: "stratum2.suchpool.pw:3335".into(),
            worker_name: "Toorop.Miner1".into(),
            worker_password: "x".into(),
        },
        dry_run,
    }
}

fn context(market: &Arc<MockMarketplace>, wallet: &Arc<MockWallet>) -> RunContext {
    RunContext {
        marketplace: market.clone(),
        payments: wallet.clone(),
        settlement: SettlementConfig::default(),
    }
}

fn completed(outcome: RunOutcome) -> RunReport {
    match outcome {
        RunOutcome::Completed(report) => report,
        RunOutcome::NothingFound => panic!("expected a completed run"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_selection_stops_before_overpriced_rig() {
    let market = Arc::new(MockMarketplace::with_pages(vec![vec![
        rig(1, dec!(1), dec!(0.0001)),
        rig(2, dec!(1), dec!(0.0002)),
        rig(3, dec!(1), dec!(0.0005)),
    ]]));
    let wallet = Arc::new(MockWallet::new(dec!(1)));

    let report = completed(
        run(&context(&market, &wallet), &request(dec!(100), dec!(0.0003), false))
            .await
            .unwrap(),
    );

    let mut reserved = market.reservations();
    reserved.sort_unstable();
    assert_eq!(reserved, vec![1, 2]);
    assert_eq!(report.settlement.paid.len(), 2);
    // The search ended on page 1; page 2 was never requested.
    assert_eq!(market.pages_requested(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn test_oversized_rig_skipped_smaller_one_taken() {
    let market = Arc::new(MockMarketplace::with_pages(vec![vec![
        rig(1, dec!(6), dec!(0.0001)),
        rig(2, dec!(6), dec!(0.0001)),
        rig(3, dec!(2), dec!(0.0001)),
    ]]));
    let wallet = Arc::new(MockWallet::new(dec!(1)));

    let report = completed(
        run(&context(&market, &wallet), &request(dec!(10), dec!(0.001), false))
            .await
            .unwrap(),
    );

    assert_eq!(report.selection.total_speed, dec!(8));
    let selected: Vec<u64> = report.selection.rigs.iter().map(|r| r.id).collect();
    assert_eq!(selected, vec![1, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_dry_run_makes_no_reservation_or_payment() {
    let market = Arc::new(MockMarketplace::with_pages(vec![vec![
        rig(1, dec!(2), dec!(0.0001)),
        rig(2, dec!(2), dec!(0.0001)),
    ]]));
    let wallet = Arc::new(MockWallet::new(dec!(1)));

    let report = completed(
        run(&context(&market, &wallet), &request(dec!(10), dec!(0.001), true))
            .await
            .unwrap(),
    );

    assert_eq!(report.reservations.simulated, 2);
    assert!(market.reservations().is_empty());
    assert!(wallet.sent().is_empty());
    assert!(report.settlement.paid.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_payment_eventually_succeeds() {
    let market = Arc::new(MockMarketplace::with_pages(vec![vec![rig(
        1,
        dec!(2),
        dec!(0.0001),
    )]]));
    let wallet = Arc::new(MockWallet::new(dec!(1)).rate_limited(3));

    let start = tokio::time::Instant::now();
    let report = completed(
        run(&context(&market, &wallet), &request(dec!(10), dec!(0.001), false))
            .await
            .unwrap(),
    );

    assert_eq!(wallet.sent().len(), 4);
    // Every retry reuses the rental id as idempotency token.
    assert!(wallet.sent().iter().all(|r| r.idem == "90001"));
    assert_eq!(report.settlement.paid.len(), 1);
    assert_eq!(
        report.settlement.paid[0].confirmation_url.as_deref(),
        Some("https://blockchain.info/tx/hash-tx-90001")
    );
    assert!(start.elapsed() >= Duration::from_secs(14));
    assert!(start.elapsed() < Duration::from_secs(15 * 60));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_defers_current_and_remaining_rentals() {
    let market = Arc::new(MockMarketplace::with_pages(vec![vec![
        rig(1, dec!(1), dec!(0.0001)),
        rig(2, dec!(1), dec!(0.0001)),
        rig(3, dec!(1), dec!(0.0001)),
    ]]));
    // Enough rejections to outlast the whole window.
    let wallet = Arc::new(MockWallet::new(dec!(1)).rate_limited(1_000));

    let report = completed(
        run(&context(&market, &wallet), &request(dec!(10), dec!(0.001), false))
            .await
            .unwrap(),
    );

    let first = report.reservations.rentals[0].id;
    assert!(wallet.sent().iter().all(|r| r.idem == first.to_string()));
    assert_eq!(report.settlement.deferred.len(), 3);
    assert_eq!(report.settlement.deferred[0].id, first);
    assert!(report.settlement.paid.is_empty());
    assert!(report.settlement.failed.is_empty());
}

#[tokio::test]
async fn test_nothing_found_exits_cleanly() {
    let market = Arc::new(MockMarketplace::with_pages(vec![vec![rig(
        1,
        dec!(2),
        dec!(0.01),
    )]]));
    let wallet = Arc::new(MockWallet::new(dec!(1)));

    let outcome = run(&context(&market, &wallet), &request(dec!(10), dec!(0.001), false))
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::NothingFound));
    assert_eq!(wallet.balance_checks(), 0);
    assert!(market.reservations().is_empty());
    assert!(wallet.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_reservation_is_not_paid() {
    let market = Arc::new(
        MockMarketplace::with_pages(vec![vec![
            rig(1, dec!(1), dec!(0.0001)),
            rig(2, dec!(1), dec!(0.0001)),
            rig(3, dec!(1), dec!(0.0001)),
        ]])
        .fail_rig(2),
    );
    let wallet = Arc::new(MockWallet::new(dec!(1)));

    let report = completed(
        run(&context(&market, &wallet), &request(dec!(10), dec!(0.001), false))
            .await
            .unwrap(),
    );

    assert_eq!(report.reservations.total(), 3);
    assert_eq!(report.reservations.failures.len(), 1);
    assert_eq!(report.reservations.failures[0].rig_id, 2);
    let mut paid: Vec<String> = wallet.sent().into_iter().map(|r| r.idem).collect();
    paid.sort();
    assert_eq!(paid, vec!["90001", "90003"]);
}

#[tokio::test]
async fn test_insufficient_balance_reserves_nothing() {
    let market = Arc::new(MockMarketplace::with_pages(vec![vec![
        rig(1, dec!(1), dec!(0.0001)),
        rig(2, dec!(1), dec!(0.0001)),
    ]]));
    // Two rigs need at least 2 * 0.002 in fee budget alone.
    let wallet = Arc::new(MockWallet::new(dec!(0.003)));

    let err = run(&context(&market, &wallet), &request(dec!(10), dec!(0.001), false))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<RentError>(),
        Some(RentError::InsufficientBalance { .. })
    ));
    assert!(market.reservations().is_empty());
}

#[tokio::test]
async fn test_unknown_unit_aborts_run() {
    let mut odd = rig(1, dec!(1), dec!(0.0001));
    odd.price.unit = "BTC/Gh/day".into();
    let market = Arc::new(MockMarketplace::with_pages(vec![vec![odd]]));
    let wallet = Arc::new(MockWallet::new(dec!(1)));

    let err = run(&context(&market, &wallet), &request(dec!(10), dec!(0.001), false))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<RentError>(),
        Some(RentError::UnknownPriceUnit(_))
    ));
    assert_eq!(wallet.balance_checks(), 0);
}
