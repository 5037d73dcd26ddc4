use marketdna::config::TradeManagementConfig;
use marketdna::engines::evaluation::Portfolio;
use marketdna::types::{Direction, ExitReason};

fn assert_close(actual: f64, expected: f64) {
    assert!((actual - expected).abs() < 1e-9, "expected {}, got {}", expected, actual);
}

fn rules(entry_threshold: f64, exit_threshold: f64, position_fraction: f64) -> TradeManagementConfig {
    TradeManagementConfig {
        entry_threshold,
        exit_threshold,
        position_fraction,
    }
}

#[test]
fn test_votes_inside_the_entry_band_stay_flat() {
    let mut portfolio = Portfolio::new(10000.0);

    // The default entry threshold is 0.5 and must be exceeded.
    for (bar, vote) in [0.5, -0.5, 0.3, 0.0].into_iter().enumerate() {
        portfolio.process_bar(bar, vote, 100.0 + bar as f64).unwrap();
    }

    assert!(portfolio.position.is_none());
    assert!(portfolio.get_trades().is_empty());
    assert_eq!(portfolio.get_equity_curve(), &[10000.0; 5]);
}

#[test]
fn test_entry_threshold_is_configurable() {
    let mut portfolio = Portfolio::with_rules(10000.0, rules(0.2, 0.0, 0.1), 0.0);
    portfolio.process_bar(0, 0.3, 100.0).unwrap();

    let position = portfolio.position.as_ref().unwrap();
    assert_eq!(position.direction, Direction::Long);
    assert_eq!(position.entry_bar, 0);
}

#[test]
fn test_position_fraction_sizes_the_trade() {
    let mut portfolio = Portfolio::with_rules(10000.0, rules(0.5, 0.0, 0.25), 0.0);
    portfolio.process_bar(0, 0.9, 50.0).unwrap();

    // A quarter of the cash at $50 buys 50 units.
    assert_eq!(portfolio.position.as_ref().unwrap().size, 50.0);
    assert_eq!(portfolio.cash, 7500.0);
}

#[test]
fn test_weak_opposing_vote_does_not_exit() {
    let mut portfolio = Portfolio::with_rules(10000.0, rules(0.5, 0.3, 0.1), 0.0);
    portfolio.process_bar(0, 1.0, 100.0).unwrap();

    portfolio.process_bar(1, -0.2, 105.0).unwrap();
    assert!(portfolio.position.is_some());

    portfolio.process_bar(2, -0.4, 110.0).unwrap();
    assert!(portfolio.position.is_none());

    let trades = portfolio.get_trades();
    assert_eq!(trades.len(), 1);
    assert_eq!((trades[0].entry_bar, trades[0].exit_bar), (0, 2));
    assert_eq!(trades[0].size, 10.0);
    assert_eq!(trades[0].profit, 100.0);
    assert_eq!(trades[0].exit_reason, ExitReason::Signal);
}

#[test]
fn test_short_profits_from_a_decline() {
    let mut portfolio = Portfolio::new(10000.0);
    portfolio.process_bar(0, -1.0, 100.0).unwrap();
    portfolio.process_bar(1, 1.0, 80.0).unwrap();

    let trades = portfolio.get_trades();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].direction, Direction::Short);
    assert_eq!(trades[0].profit, 200.0);
    assert_eq!(portfolio.final_balance(), 10200.0);

    // The exit bar does not also open the opposite position.
    assert!(portfolio.position.is_none());
    portfolio.process_bar(2, 1.0, 80.0).unwrap();
    assert_eq!(portfolio.position.as_ref().unwrap().direction, Direction::Long);
}

#[test]
fn test_commission_is_charged_on_both_legs() {
    let mut portfolio = Portfolio::with_rules(10000.0, rules(0.5, 0.0, 0.1), 0.001);
    portfolio.process_bar(0, 1.0, 100.0).unwrap();
    assert_close(portfolio.position.as_ref().unwrap().entry_fee, 1.0);
    assert_close(portfolio.cash, 8999.0);

    portfolio.process_bar(1, -1.0, 110.0).unwrap();

    let trade = &portfolio.get_trades()[0];
    assert_close(trade.fees, 2.1);
    assert_close(trade.profit, 97.9);
    assert_close(portfolio.realized_pnl, 97.9);
    assert_close(portfolio.final_balance(), 10097.9);
    assert_close(portfolio.equity(), portfolio.final_balance());
}

#[test]
fn test_finish_closes_at_end_of_data() {
    let mut portfolio = Portfolio::with_rules(10000.0, rules(0.5, 0.0, 0.1), 0.001);
    portfolio.process_bar(0, 1.0, 100.0).unwrap();
    portfolio.process_bar(1, 0.6, 120.0).unwrap();

    // Marked to market, the exit fee is not paid yet.
    assert_close(*portfolio.get_equity_curve().last().unwrap(), 10199.0);

    portfolio.finish(1, 120.0).unwrap();

    let trade = &portfolio.get_trades()[0];
    assert_eq!(trade.exit_reason, ExitReason::EndOfData);
    assert_eq!(trade.exit_bar, 1);
    assert!(portfolio.position.is_none());

    let curve = portfolio.get_equity_curve();
    assert_eq!(curve.len(), 3);
    assert_close(curve[2], 10197.8);
    assert_close(portfolio.final_balance(), 10197.8);
}

#[test]
fn test_finish_when_flat_changes_nothing() {
    let mut portfolio = Portfolio::new(10000.0);
    portfolio.process_bar(0, 0.1, 100.0).unwrap();
    let before = portfolio.get_equity_curve().to_vec();

    portfolio.finish(0, 100.0).unwrap();

    assert_eq!(portfolio.get_equity_curve(), before.as_slice());
    assert!(portfolio.get_trades().is_empty());
}

#[test]
fn test_non_positive_price_never_opens() {
    let mut portfolio = Portfolio::new(10000.0);
    portfolio.process_bar(0, 1.0, 0.0).unwrap();
    assert!(portfolio.position.is_none());
    assert_eq!(portfolio.cash, 10000.0);
}

#[test]
fn test_max_drawdown_runs_from_peak_to_trough() {
    let mut portfolio = Portfolio::with_rules(10000.0, rules(0.5, 0.0, 1.0), 0.0);
    for (bar, price) in [100.0, 120.0, 90.0, 110.0].into_iter().enumerate() {
        portfolio.process_bar(bar, 0.8, price).unwrap();
    }

    assert_eq!(portfolio.peak_equity, 12000.0);
    assert_eq!(portfolio.max_drawdown, 0.25);
    assert!(portfolio.current_drawdown < portfolio.max_drawdown);
    assert_eq!(portfolio.get_equity_curve(), &[10000.0, 10000.0, 12000.0, 9000.0, 11000.0]);
}
