//! Navigation decisions through the panel navigator.

use super::{settle, Answer, Harness};
use module_gate::{
    BalanceGate, Decision, NavigationSink, Notice, PanelNavigator, Price, TopUpPrompt, UserId,
};
use parking_lot::Mutex;
use std::sync::Arc;

const CPF: &str = "/dashboard/consultar-cpf";

#[derive(Default)]
struct Recorder {
    navigated: Mutex<Vec<String>>,
    blocked: Mutex<Vec<TopUpPrompt>>,
    notices: Mutex<Vec<Notice>>,
}

impl NavigationSink for Recorder {
    fn navigate(&self, path: &str) {
        self.navigated.lock().push(path.to_string());
    }

    fn block(&self, prompt: &TopUpPrompt) {
        self.blocked.lock().push(prompt.clone());
    }

    fn notify(&self, notice: &Notice) {
        self.notices.lock().push(notice.clone());
    }
}

fn navigator(h: &Harness, balance: f64) -> (PanelNavigator, Arc<Recorder>) {
    let sink = Arc::new(Recorder::default());
    let nav = PanelNavigator::new(
        Arc::clone(&h.sessions),
        Arc::new(move || balance),
        sink.clone(),
        BalanceGate::default(),
    );
    (nav, sink)
}

fn price(s: &str) -> Price {
    Price::parse(s).unwrap()
}

#[tokio::test]
async fn test_decision_table() {
    let cases = [
        // (price, balance, has history, expected)
        ("10.00", 15.0, false, "allow"),
        ("10.00", 5.0, false, "block"),
        ("10.00", 5.0, true, "notice"),
        ("10.00", 10.0, false, "allow"),
        ("0", 0.0, false, "allow"),
    ];

    for (p, balance, history, expected) in cases {
        let h = Harness::in_memory();
        let cache = h.sessions.login(UserId::from("u1")).unwrap();
        if history {
            cache.mark_present(CPF);
        }
        let (nav, _sink) = navigator(&h, balance);

        let decision = nav.check_balance_and_navigate(CPF, "CPF", price(p)).unwrap();
        let got = match decision {
            Decision::Allow { .. } => "allow",
            Decision::AllowWithNotice { .. } => "notice",
            Decision::Block { .. } => "block",
        };
        assert_eq!(got, expected, "price={p} balance={balance} history={history}");
    }
}

#[tokio::test]
async fn test_blocked_user_gets_top_up_link() {
    let h = Harness::in_memory();
    h.sessions.login(UserId::from("u1")).unwrap();
    let (nav, sink) = navigator(&h, 5.0);

    let decision = nav.check_balance_and_navigate(CPF, "CPF", price("10.00")).unwrap();
    assert!((decision.top_up_amount().unwrap() - 5.0).abs() < 1e-9);

    assert!(sink.navigated.lock().is_empty());
    let blocked = sink.blocked.lock();
    assert_eq!(blocked.len(), 1);
    assert_eq!(
        blocked[0].deposit_link,
        "/dashboard/adicionar-saldo?valor=5.00&fromModule=true"
    );
}

#[tokio::test]
async fn test_cold_miss_blocks_then_history_lets_user_in() {
    let h = Harness::in_memory();
    h.lookup.answer(CPF, Answer::Total(12));
    let cache = h.sessions.login(UserId::from("u1")).unwrap();
    let (nav, sink) = navigator(&h, 0.0);

    // First attempt: the cache has not heard back yet.
    let first = nav.check_balance_and_navigate(CPF, "CPF", price("10.00")).unwrap();
    assert!(matches!(first, Decision::Block { .. }));

    assert!(settle(&cache, CPF).await);

    let second = nav.check_balance_and_navigate(CPF, "CPF", price("10.00")).unwrap();
    assert!(matches!(second, Decision::AllowWithNotice { .. }));
    assert_eq!(*sink.navigated.lock(), vec![CPF.to_string()]);
    assert_eq!(sink.notices.lock().len(), 1);
    assert_eq!(h.lookup.calls_for(CPF), 1);
}

#[tokio::test]
async fn test_record_creation_grants_access_immediately() {
    let h = Harness::in_memory();
    let cache = h.sessions.login(UserId::from("u1")).unwrap();
    let (nav, _sink) = navigator(&h, 1.0);

    assert!(!nav
        .check_balance_and_navigate(CPF, "CPF", price("10.00"))
        .unwrap()
        .is_allowed());

    // The user's own query just created a record.
    cache.mark_present(CPF);

    assert!(nav
        .check_balance_and_navigate(CPF, "CPF", price("10.00"))
        .unwrap()
        .is_allowed());
}

#[tokio::test]
async fn test_logged_out_user_gets_no_decision() {
    let h = Harness::in_memory();
    h.sessions.login(UserId::from("u1")).unwrap();
    h.sessions.logout();
    let (nav, sink) = navigator(&h, 100.0);

    assert!(nav
        .check_balance_and_navigate(CPF, "CPF", price("10.00"))
        .is_none());
    assert!(sink.navigated.lock().is_empty());
    assert_eq!(h.lookup.total_calls(), 0);
}
