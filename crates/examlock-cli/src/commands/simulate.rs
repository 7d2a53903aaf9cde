use std::str::FromStr;

use clap::Args;
use examlock_core::sim::present_all;
use examlock_core::storage::sqlite::DURABLE_NAMESPACE;
use examlock_core::{
    Event, ExamSession, FileSettings, Host, KeyCombo, MemoryStore, Presenter, Signal, SqliteStore,
    VirtualHost,
};
use serde_json::json;

use super::{settings_file, CliResult};

#[derive(Args)]
pub struct SimulateArgs {
    /// Steps: hidden, visible, blur, key:<combo>, submit, wait:<secs>,
    /// reload, close, clear
    #[arg(required = true)]
    steps: Vec<Step>,
    /// Start from an empty in-memory durable tier instead of the database
    #[arg(long)]
    fresh: bool,
    /// Page location recorded in the violation log
    #[arg(long, default_value = "https://exam.local/")]
    location: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Signal(Signal),
    Wait(u64),
    /// Unload and load the page in the same tab.
    Reload,
    /// Close the tab and open a new one.
    Close,
    Clear,
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(combo) = s.strip_prefix("key:") {
            let combo = combo.parse::<KeyCombo>().map_err(|e| e.to_string())?;
            return Ok(Step::Signal(Signal::KeyDown(combo)));
        }
        if let Some(secs) = s.strip_prefix("wait:") {
            let secs = secs
                .parse::<u64>()
                .map_err(|e| format!("invalid wait '{secs}': {e}"))?;
            return Ok(Step::Wait(secs));
        }
        match s.to_ascii_lowercase().as_str() {
            "hidden" => Ok(Step::Signal(Signal::VisibilityChange { hidden: true })),
            "visible" => Ok(Step::Signal(Signal::VisibilityChange { hidden: false })),
            "blur" => Ok(Step::Signal(Signal::WindowBlur)),
            "submit" => Ok(Step::Signal(Signal::FormSubmit)),
            "reload" => Ok(Step::Reload),
            "close" => Ok(Step::Close),
            "clear" => Ok(Step::Clear),
            other => Err(format!("unknown step '{other}'")),
        }
    }
}

/// Prints events as JSON lines stamped with seconds since the simulation
/// started.
struct JsonLines {
    origin_ms: i64,
    at_ms: i64,
}

impl JsonLines {
    fn elapsed_secs(&self) -> f64 {
        (self.at_ms - self.origin_ms) as f64 / 1000.0
    }

    fn line(&self, value: serde_json::Value) {
        println!("{value}");
    }
}

impl Presenter for JsonLines {
    fn present(&mut self, event: &Event) {
        self.line(json!({ "t": self.elapsed_secs(), "event": event }));
    }
}

type Session = ExamSession<MemoryStore, SqliteStore>;

fn open_page(
    settings: &FileSettings,
    session_tier: MemoryStore,
    durable_tier: SqliteStore,
    host: &mut VirtualHost,
    out: &mut JsonLines,
) -> Session {
    let (session, events) = ExamSession::load(settings, session_tier, durable_tier, host);
    out.at_ms = host.now_ms();
    out.line(json!({ "t": out.elapsed_secs(), "page": "load", "session": session.id() }));
    present_all(out, &events);
    session
}

fn unload(mut session: Session, host: &mut VirtualHost) -> (MemoryStore, SqliteStore) {
    session.stop();
    session.before_unload();
    host.unload();
    session.into_tiers()
}

pub fn run(args: SimulateArgs) -> CliResult {
    let settings = settings_file()?;
    let durable = if args.fresh {
        SqliteStore::open_memory(DURABLE_NAMESPACE)?
    } else {
        SqliteStore::open_default()?
    };

    let mut host = VirtualHost::starting_now().with_location(args.location);
    let mut out = JsonLines {
        origin_ms: host.now_ms(),
        at_ms: host.now_ms(),
    };
    let mut session = open_page(&settings, MemoryStore::new(), durable, &mut host, &mut out);

    for step in args.steps {
        out.at_ms = host.now_ms();
        match step {
            Step::Signal(signal) => {
                let response = session.handle_signal(&signal, &mut host);
                out.line(json!({
                    "t": out.elapsed_secs(),
                    "signal": signal,
                    "violation": response.observation.violation,
                    "preventDefault": response.observation.prevent_default,
                }));
                present_all(&mut out, &response.events);
            }
            Step::Wait(secs) => {
                let until = host.now_ms().saturating_add(i64::try_from(secs.saturating_mul(1000))?);
                while let Some(id) = host.next_due(until) {
                    let events = session.on_timer(id, &mut host);
                    out.at_ms = host.now_ms();
                    present_all(&mut out, &events);
                }
                host.set_now(until);
            }
            Step::Reload => {
                let (session_tier, durable_tier) = unload(session, &mut host);
                session = open_page(&settings, session_tier, durable_tier, &mut host, &mut out);
            }
            Step::Close => {
                let (_, durable_tier) = unload(session, &mut host);
                session = open_page(&settings, MemoryStore::new(), durable_tier, &mut host, &mut out);
            }
            Step::Clear => {
                let events = session.clear(&mut host);
                present_all(&mut out, &events);
            }
        }
    }

    // The process exiting is a page unload too.
    let _ = unload(session, &mut host);
    Ok(())
}
