//! Rate limit engine behaviour tests
//!
//! Drives the public engine API with a manual clock

use std::sync::Arc;
use std::time::Duration;

use warden_core::rate_limit::{
	BlockReason, LockoutOutcome, ManualClock, RateLimitConfig, RateLimitEngine, RateLimitRule,
	HEADER_BLOCKED, HEADER_BYPASS, HEADER_LIMIT, HEADER_REMAINING, HEADER_RETRY_AFTER,
};

fn create_engine(rules: Vec<RateLimitRule>) -> (Arc<RateLimitEngine>, Arc<ManualClock>) {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
	let clock = Arc::new(ManualClock::default());
	let config = RateLimitConfig { rules, ..Default::default() };
	let engine = RateLimitEngine::with_clock(config, clock.clone()).expect("valid config");
	(Arc::new(engine), clock)
}

fn default_engine() -> (Arc<RateLimitEngine>, Arc<ManualClock>) {
	create_engine(RateLimitConfig::default().rules)
}

#[test]
fn test_login_scenario_six_calls() {
	let (engine, clock) = create_engine(vec![
		RateLimitRule::new("login", 5, 60, 60),
		RateLimitRule::new("default", 60, 60, 60),
	]);

	let mut results = Vec::new();
	let mut last = None;
	for _ in 0..6 {
		let result = engine.check_rate_limit("login", "1.2.3.4", None);
		results.push(result.allowed);
		last = Some(result);
		clock.advance(Duration::from_millis(150));
	}
	assert_eq!(results, vec![true, true, true, true, true, false]);

	let last = last.expect("six results");
	assert_eq!(last.retry_after, Some(Duration::from_secs(60)));
	assert_eq!(last.reason, Some(BlockReason::RateLimit));
	let headers = last.headers();
	assert_eq!(headers.get(HEADER_RETRY_AFTER).map(String::as_str), Some("60"));
	assert_eq!(headers.get(HEADER_LIMIT).map(String::as_str), Some("5"));
	assert_eq!(headers.get(HEADER_REMAINING).map(String::as_str), Some("0"));
	// Window denials carry no block tag
	assert!(!headers.contains_key(HEADER_BLOCKED));
}

#[test]
fn test_every_rule_allows_exactly_max_requests() {
	let (engine, _clock) = default_engine();
	for rule in engine.catalog().rules() {
		let ip = format!("198.51.100.{}", rule.max_requests % 250);
		for i in 0..rule.max_requests {
			let result = engine.check_rate_limit(&rule.name, &ip, None);
			assert!(result.allowed, "rule {} call {} denied", rule.name, i + 1);
		}
		assert!(!engine.check_rate_limit(&rule.name, &ip, None).allowed, "rule {}", rule.name);
		engine.unblock_ip(&ip);
	}
}

#[test]
fn test_window_rolls_forward() {
	let (engine, clock) = create_engine(vec![RateLimitRule::new("login", 5, 60, 300)]);
	for _ in 0..5 {
		assert!(engine.check_rate_limit("login", "1.2.3.4", None).allowed);
	}
	assert!(!engine.check_rate_limit("login", "1.2.3.4", None).allowed);

	// retry_after is advisory: the window itself decides
	clock.advance(Duration::from_secs(60));
	assert!(engine.check_rate_limit("login", "1.2.3.4", None).allowed);
}

#[test]
fn test_lockout_lifecycle() {
	let (engine, clock) = default_engine();

	for _ in 0..4 {
		engine.record_login_attempt("1.2.3.4", "a@b.com", false);
	}
	assert!(!engine.is_locked("a@b.com"));
	let outcome = engine.record_login_attempt("1.2.3.4", "a@b.com", false);
	assert!(matches!(outcome.account, LockoutOutcome::Locked { .. }));
	assert!(engine.is_locked("a@b.com"));

	// Further failures keep the same lock and are not new lockouts
	let outcome = engine.record_login_attempt("1.2.3.4", "a@b.com", false);
	assert!(matches!(outcome.account, LockoutOutcome::AlreadyLocked { .. }));
	assert_eq!(engine.stats().total_user_lockouts, 1);

	clock.advance(Duration::from_secs(899));
	assert!(engine.is_locked("a@b.com"));
	clock.advance(Duration::from_secs(1));
	assert!(!engine.is_locked("a@b.com"));
	assert_eq!(engine.account_status("a@b.com").failed_attempts, 0);
}

#[test]
fn test_success_before_threshold_resets() {
	let (engine, _clock) = default_engine();
	for _ in 0..4 {
		engine.record_login_attempt("1.2.3.4", "a@b.com", false);
	}
	engine.record_login_attempt("1.2.3.4", "a@b.com", true);
	assert_eq!(engine.account_status("a@b.com").failed_attempts, 0);
	for _ in 0..4 {
		engine.record_login_attempt("1.2.3.4", "a@b.com", false);
	}
	assert!(!engine.is_locked("a@b.com"));
}

#[test]
fn test_admin_operations_are_idempotent() {
	let (engine, _clock) = default_engine();
	engine.unlock_account("nonexistent@x.com");
	assert!(!engine.is_locked("nonexistent@x.com"));
	assert!(!engine.account_status("nonexistent@x.com").tracked);

	engine.unblock_ip("203.0.113.99");
	engine.remove_bypass("203.0.113.99");
	engine.add_bypass("203.0.113.99");
	engine.add_bypass("203.0.113.99");
	assert_eq!(engine.list_bypass().len(), 1);
	assert_eq!(engine.stats().bypassed_ips, 1);
}

#[test]
fn test_unlock_and_unblock() {
	let (engine, _clock) = default_engine();
	for _ in 0..10 {
		engine.record_login_attempt("1.2.3.4", "a@b.com", false);
	}
	assert!(engine.is_locked("a@b.com"));
	assert!(engine.ip_status("1.2.3.4").blocked);

	engine.unlock_account("A@B.COM");
	engine.unblock_ip("::ffff:1.2.3.4");
	assert!(!engine.is_locked("a@b.com"));
	let status = engine.ip_status("1.2.3.4");
	assert!(!status.blocked);
	assert!(status.suspicious_score.abs() < f64::EPSILON);
	assert!(engine.check_rate_limit("login", "1.2.3.4", Some("a@b.com")).allowed);
}

#[test]
fn test_bypass_is_always_allowed() {
	let (engine, _clock) = default_engine();
	engine.add_bypass("10.0.0.1");
	for _ in 0..200 {
		let result = engine.check_rate_limit("login", "10.0.0.1", None);
		assert!(result.allowed);
		assert_eq!(result.headers().get(HEADER_BYPASS).map(String::as_str), Some("true"));
	}

	engine.remove_bypass("10.0.0.1");
	assert!(!engine.check_rate_limit("login", "10.0.0.1", None).bypassed);
}

#[test]
fn test_blocked_requests_counted_once_each() {
	let (engine, _clock) = create_engine(vec![RateLimitRule::new("default", 3, 60, 60)]);
	let mut blocked = 0;
	for _ in 0..8 {
		let before = engine.stats().total_blocked_requests;
		let result = engine.check_rate_limit("default", "1.2.3.4", None);
		let after = engine.stats().total_blocked_requests;
		if result.allowed {
			assert_eq!(after, before);
		} else {
			blocked += 1;
			assert_eq!(after, before + 1);
		}
	}
	assert_eq!(blocked, 5);
	assert_eq!(engine.stats().total_blocked_requests, 5);
}

#[test]
fn test_distributed_attack_blocks_ip_across_accounts() {
	let (engine, _clock) = default_engine();
	// One failure per account: no lockout and no window limit is ever reached
	let mut blocked_at = None;
	for i in 0..20 {
		let email = format!("user{i}@example.com");
		let result = engine.check_rate_limit("default", "192.0.2.10", Some(&email));
		if result.reason == Some(BlockReason::Ip) {
			blocked_at = Some(i);
			break;
		}
		assert!(result.allowed);
		engine.record_login_attempt("192.0.2.10", &email, false);
	}
	assert_eq!(blocked_at, Some(10));
	assert_eq!(engine.stats().total_ip_blocks, 1);
	assert_eq!(engine.stats().active_lockouts, 0);
	// Blocked for every rule, not just the one that was checked
	let result = engine.check_rate_limit("login", "192.0.2.10", None);
	assert_eq!(result.reason, Some(BlockReason::Ip));
	assert_eq!(result.headers().get(HEADER_BLOCKED).map(String::as_str), Some("ip"));
}

#[test]
fn test_sweep_forgets_expired_keys() {
	let (engine, clock) = default_engine();
	engine.check_rate_limit("login", "1.2.3.4", Some("a@b.com"));
	engine.record_login_attempt("1.2.3.4", "a@b.com", false);

	let report = engine.sweep();
	assert_eq!(report.total(), 0);

	clock.advance(Duration::from_secs(3601));
	let report = engine.sweep();
	assert_eq!(report.windows, 1);
	assert_eq!(report.accounts, 1);
	assert_eq!(report.ips, 1);
	assert_eq!(report.attempts, 1);

	// Indistinguishable from never seen
	let ip = engine.ip_status("1.2.3.4");
	let fresh = engine.ip_status("1.2.3.5");
	assert!(!ip.tracked);
	assert!(ip.windows.is_empty());
	assert_eq!(ip.recent_requests, fresh.recent_requests);
	let account = engine.account_status("a@b.com");
	assert!(!account.tracked);
	assert_eq!(account.failed_attempts, 0);

	let stats = engine.stats();
	assert_eq!(stats.tracked_windows, 0);
	assert_eq!(stats.tracked_accounts, 0);
	assert_eq!(stats.tracked_ips, 0);
	assert!(engine.check_rate_limit("login", "1.2.3.4", None).allowed);
}

fn small_engine() -> (Arc<RateLimitEngine>, Arc<ManualClock>) {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
	let clock = Arc::new(ManualClock::default());
	let config = RateLimitConfig { max_tracked_keys: 16, shards: 1, ..Default::default() };
	let engine = RateLimitEngine::with_clock(config, clock.clone()).expect("valid config");
	(Arc::new(engine), clock)
}

#[test]
fn test_lockout_survives_key_churn() {
	let (engine, _clock) = small_engine();
	for _ in 0..5 {
		engine.record_login_attempt("192.0.2.1", "victim@x.com", false);
	}
	assert!(engine.is_locked("victim@x.com"));

	// Fill the account and IP stores many times over
	for i in 0..64 {
		engine.record_login_attempt(&format!("198.51.100.{i}"), &format!("junk{i}@x.com"), false);
	}
	let stats = engine.stats();
	assert_eq!(stats.tracked_accounts, 16);
	assert!(stats.tracked_ips <= 16);

	assert!(engine.is_locked("victim@x.com"));
	let result = engine.check_rate_limit("login", "203.0.113.1", Some("victim@x.com"));
	assert_eq!(result.reason, Some(BlockReason::Account));
	assert_eq!(result.headers().get(HEADER_RETRY_AFTER).map(String::as_str), Some("900"));
}

#[test]
fn test_ip_block_survives_key_churn() {
	let (engine, clock) = small_engine();
	for i in 0..10 {
		engine.record_login_attempt("192.0.2.66", &format!("user{i}@x.com"), false);
	}
	assert!(engine.ip_status("192.0.2.66").blocked);

	for i in 0..64 {
		assert!(engine.check_rate_limit("default", &format!("198.51.100.{i}"), None).allowed);
	}
	assert!(engine.stats().tracked_ips <= 16);

	let result = engine.check_rate_limit("login", "192.0.2.66", None);
	assert_eq!(result.reason, Some(BlockReason::Ip));
	assert_eq!(result.headers().get(HEADER_RETRY_AFTER).map(String::as_str), Some("3600"));

	// Retry-After counts down the remaining block
	clock.advance(Duration::from_secs(600));
	let result = engine.check_rate_limit("login", "192.0.2.66", None);
	assert_eq!(result.headers().get(HEADER_RETRY_AFTER).map(String::as_str), Some("3000"));
	assert_eq!(engine.stats().total_ip_blocks, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checks_lose_no_updates() {
	let (engine, _clock) = create_engine(vec![RateLimitRule::new("default", 100, 60, 60)]);

	let mut handles = vec![];
	for _ in 0..8 {
		let engine = Arc::clone(&engine);
		handles.push(tokio::spawn(async move {
			(0..25).filter(|_| engine.check_rate_limit("default", "192.0.2.1", None).allowed).count()
		}));
	}

	let mut allowed = 0;
	for handle in handles {
		allowed += handle.await.expect("Task panicked");
	}
	assert_eq!(allowed, 100);
	assert!(!engine.check_rate_limit("default", "192.0.2.1", None).allowed);
}

// vim: ts=4
