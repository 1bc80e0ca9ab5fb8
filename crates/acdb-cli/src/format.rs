//! Renders [`TraceEvent`]s as the human-readable trace described in
//! spec.md §6. Exact wording is explicitly not a compatibility surface; this
//! module only has to satisfy the line-per-event shape the suite expects.

use acdb_core::coordinator::TraceEvent;

pub fn print_event(event: &TraceEvent) {
    match event {
        TraceEvent::Accepted { ts, summary } => println!("[{ts}] accepted {summary}"),
        TraceEvent::Read { ts, tx, var, result: Some(v) } => println!("[{ts}] {tx} read {var} = {v}"),
        TraceEvent::Read { ts, tx, var, result: None } => println!("[{ts}] {tx} read {var} failed, retrying"),
        TraceEvent::Write { ts, tx, var, val, success: true } => println!("[{ts}] {tx} wrote {var} = {val}"),
        TraceEvent::Write { ts, tx, var, val, success: false } => {
            println!("[{ts}] {tx} write {var} = {val} blocked, retrying");
        }
        TraceEvent::Commit { ts, tx } => println!("[{ts}] {tx} commits"),
        TraceEvent::Abort { ts, tx } => println!("[{ts}] {tx} aborts"),
        TraceEvent::DeadlockVictim { ts, tx } => println!("[{ts}] deadlock detected, aborting {tx}"),
        TraceEvent::SiteFailed { ts, site } => println!("[{ts}] site {site} fails"),
        TraceEvent::SiteRecovered { ts, site } => println!("[{ts}] site {site} recovers"),
        TraceEvent::Dump { site, data, locks } => {
            let data_str = data.iter().map(|(v, val)| format!("{v}={val}")).collect::<Vec<_>>().join(", ");
            println!("site {site}: {data_str}");
            let locks_str = locks
                .iter()
                .filter_map(|(v, l)| l.as_ref().map(|l| format!("{v}:{l:?}")))
                .collect::<Vec<_>>()
                .join(", ");
            println!("site {site} locks: {locks_str}");
        }
    }
}

pub fn print_all(events: &[TraceEvent]) {
    for event in events {
        print_event(event);
    }
}
