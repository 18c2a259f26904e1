use billing::RequestProcessor;
use cirrus_core::{LimitKind, Request, RequestKind, Timestamp};
use proptest::prelude::*;

/// Raw material for one request; turned into an in-order log by `build_log`.
#[derive(Debug, Clone)]
struct Step {
    op: u8,
    gap_minutes: i64,
    amount: u64,
    pick: usize,
}

fn step() -> impl Strategy<Value = Step> {
    (0u8..8, 0i64..3_000, 0u64..12_000_000_000, any::<usize>())
        .prop_map(|(op, gap_minutes, amount, pick)| Step { op, gap_minutes, amount, pick })
}

fn build_log(steps: &[Step]) -> Vec<Request> {
    let mut at = Timestamp::from_ymd_hm(2023, 1, 1, 0, 0).unwrap();
    let mut launches: Vec<Timestamp> = Vec::new();
    let mut out = Vec::with_capacity(steps.len());
    for s in steps {
        at = at.plus_minutes(s.gap_minutes);
        let small = u32::try_from(s.amount % 20).unwrap();
        let req = match s.op {
            0 => Request::Upload { at, size: s.amount },
            1 => Request::Download { at, size: s.amount / 2 },
            2 => Request::Delete { at, size: s.amount / 4 },
            3 => {
                launches.push(at);
                Request::Launch { at, count: small }
            }
            4 => match launches.get(s.pick % launches.len().max(1)) {
                Some(launched_at) => Request::Stop { at, launched_at: *launched_at, count: small },
                None => Request::Calc,
            },
            5 => Request::Calc,
            6 => Request::Upgrade { at, fee_ceiling: 100.0 + (s.amount % 50_000) as f64 },
            _ => {
                let kind = LimitKind::ALL[s.pick % 3];
                Request::Change { at, kind, value: (s.amount % 200_000_000_000) as f64 }
            }
        };
        out.push(req);
    }
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn one_outcome_per_request(steps in proptest::collection::vec(step(), 0..80)) {
        let log = build_log(&steps);
        let mut p = RequestProcessor::default();
        let out = p.run(&log);
        prop_assert_eq!(out.len(), log.len());
        for (req, outcome) in log.iter().zip(&out) {
            prop_assert_eq!(req.kind(), outcome.kind);
        }
    }

    #[test]
    fn ledger_never_holds_empty_batches(steps in proptest::collection::vec(step(), 0..80)) {
        let mut p = RequestProcessor::default();
        for req in build_log(&steps) {
            p.process(&req);
            prop_assert!(p.ledger().iter().all(|(_, count)| count > 0));
        }
    }

    #[test]
    fn committed_transfers_stay_within_limits(steps in proptest::collection::vec(step(), 0..80)) {
        let mut p = RequestProcessor::default();
        for req in build_log(&steps) {
            let outcome = p.process(&req);
            let is_transfer = matches!(outcome.kind, RequestKind::Upload | RequestKind::Download);
            if is_transfer && outcome.is_accepted() {
                let c = p.consumption();
                for kind in LimitKind::ALL {
                    prop_assert!(c.get(kind) <= p.plan().limit(kind), "{:?} over limit", kind);
                }
            }
        }
    }

    #[test]
    fn rejections_do_not_touch_consumption(steps in proptest::collection::vec(step(), 0..80)) {
        let mut p = RequestProcessor::default();
        for req in build_log(&steps) {
            let before = (*p.consumption(), p.ledger().clone(), p.period().shutdown);
            let outcome = p.process(&req);
            if !outcome.is_accepted() {
                prop_assert_eq!(*p.consumption(), before.0);
                prop_assert_eq!(p.ledger(), &before.1);
                prop_assert_eq!(p.period().shutdown, before.2);
            }
        }
    }
}
