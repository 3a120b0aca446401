//! Persistent per-application placement rules applied after a restore.

use crate::snapshot::LiveWindow;
use crate::topology::MonitorTopology;
use crate::{EngineContext, Rect, WindowState};
use serde::{Deserialize, Serialize};

/// Named target for a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RulePosition {
    LeftHalf,
    RightHalf,
    TopHalf,
    BottomHalf,
    Maximized,
    Minimized,
}

/// One user rule. A rule with neither `exe` nor `title_contains` matches
/// nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Executable name, compared case-insensitively.
    #[serde(default)]
    pub exe: Option<String>,
    /// Case-insensitive substring of the window title.
    #[serde(default)]
    pub title_contains: Option<String>,
    pub position: RulePosition,
    /// 1-based monitor; defaults to the monitor the window is on.
    #[serde(default)]
    pub monitor: Option<usize>,
}

impl Rule {
    pub fn matches(&self, exe: &str, title: &str) -> bool {
        if self.exe.is_none() && self.title_contains.is_none() {
            return false;
        }
        if let Some(want) = &self.exe {
            if want.to_lowercase() != exe.to_lowercase() {
                return false;
            }
        }
        if let Some(needle) = &self.title_contains {
            if !title.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

/// What applying a rule does to a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    Move(Rect),
    State(WindowState),
}

pub struct RuleEngine<'a> {
    rules: &'a [Rule],
}

impl<'a> RuleEngine<'a> {
    pub fn new(rules: &'a [Rule]) -> Self {
        Self { rules }
    }

    /// First rule matching the window, in configuration order.
    pub fn find_rule(&self, exe: &str, title: &str) -> Option<&'a Rule> {
        self.rules.iter().find(|r| r.matches(exe, title))
    }

    /// Action for `rule` given the window's current rectangle.
    pub fn action_for(&self, rule: &Rule, topology: &MonitorTopology, current: &Rect) -> Option<RuleAction> {
        let area = match rule.monitor {
            Some(index) => topology.work_area(index),
            None => topology
                .monitor_for_rect(current)
                .and_then(|i| topology.work_area(i)),
        };

        let half_w = |area: Rect| area.width / 2;
        let half_h = |area: Rect| area.height / 2;

        match rule.position {
            RulePosition::Maximized => Some(RuleAction::State(WindowState::Maximized)),
            RulePosition::Minimized => Some(RuleAction::State(WindowState::Minimized)),
            RulePosition::LeftHalf => area.map(|a| RuleAction::Move(Rect::new(a.x, a.y, half_w(a), a.height))),
            RulePosition::RightHalf => area.map(|a| {
                RuleAction::Move(Rect::new(a.x + half_w(a), a.y, a.width - half_w(a), a.height))
            }),
            RulePosition::TopHalf => area.map(|a| RuleAction::Move(Rect::new(a.x, a.y, a.width, half_h(a)))),
            RulePosition::BottomHalf => area.map(|a| {
                RuleAction::Move(Rect::new(a.x, a.y + half_h(a), a.width, a.height - half_h(a)))
            }),
        }
    }

    /// Apply the first matching rule to each window. Returns how many windows
    /// a rule was applied to.
    pub fn apply(&self, ctx: &EngineContext<'_>, topology: &MonitorTopology, windows: &[LiveWindow]) -> usize {
        if self.rules.is_empty() {
            return 0;
        }

        let mut applied = 0;
        for window in windows {
            let Some(rule) = self.find_rule(&window.entry.process_exe_name, &window.entry.raw_title) else {
                continue;
            };
            let current = ctx.system.window_rect(window.id).unwrap_or(window.entry.rect);
            let Some(action) = self.action_for(rule, topology, &current) else {
                tracing::debug!(window = window.id, monitor = ?rule.monitor, "Rule monitor not present");
                continue;
            };

            let result = match action {
                RuleAction::State(state) => ctx.system.set_window_state(window.id, state),
                RuleAction::Move(rect) => {
                    let restore = match ctx.system.window_state(window.id) {
                        Some(WindowState::Normal) | None => Ok(()),
                        Some(_) => ctx.system.set_window_state(window.id, WindowState::Normal),
                    };
                    restore.and_then(|()| ctx.system.move_window(window.id, rect))
                }
            };

            match result {
                Ok(()) => {
                    tracing::debug!(window = window.id, position = ?rule.position, "Applied rule");
                    applied += 1;
                }
                Err(e) => tracing::warn!(window = window.id, "Rule application failed: {}", e),
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{live_at, Call, Harness};
    use crate::topology::MonitorInfo;

    fn rule(exe: Option<&str>, title: Option<&str>, position: RulePosition) -> Rule {
        Rule {
            exe: exe.map(str::to_string),
            title_contains: title.map(str::to_string),
            position,
            monitor: None,
        }
    }

    #[test]
    fn test_rule_matching() {
        assert!(rule(Some("Slack.exe"), None, RulePosition::LeftHalf).matches("slack.exe", "x"));
        assert!(!rule(Some("slack.exe"), None, RulePosition::LeftHalf).matches("slackware.exe", "x"));
        assert!(rule(None, Some("inbox"), RulePosition::LeftHalf).matches("any.exe", "Inbox - Mail"));
        assert!(!rule(Some("a.exe"), Some("inbox"), RulePosition::LeftHalf).matches("a.exe", "Sent"));
        assert!(!rule(None, None, RulePosition::LeftHalf).matches("a.exe", "anything"));
    }

    #[test]
    fn test_first_match_wins() {
        let rules = vec![
            rule(Some("code.exe"), Some("notes"), RulePosition::LeftHalf),
            rule(Some("code.exe"), None, RulePosition::RightHalf),
        ];
        let engine = RuleEngine::new(&rules);
        assert_eq!(engine.find_rule("code.exe", "notes - x").map(|r| r.position), Some(RulePosition::LeftHalf));
        assert_eq!(engine.find_rule("code.exe", "other").map(|r| r.position), Some(RulePosition::RightHalf));
        assert!(engine.find_rule("vim.exe", "notes").is_none());
    }

    #[test]
    fn test_positions_against_work_area() {
        let mut m = MonitorInfo::new(Rect::new(0, 0, 1920, 1080));
        m.work_area = Rect::new(0, 0, 1920, 1041);
        let topology = MonitorTopology::new(vec![m]);
        let rules: Vec<Rule> = Vec::new();
        let engine = RuleEngine::new(&rules);
        let current = Rect::new(10, 10, 100, 100);

        let at = |position| engine.action_for(&rule(Some("a.exe"), None, position), &topology, &current);
        assert_eq!(at(RulePosition::LeftHalf), Some(RuleAction::Move(Rect::new(0, 0, 960, 1041))));
        assert_eq!(at(RulePosition::RightHalf), Some(RuleAction::Move(Rect::new(960, 0, 960, 1041))));
        assert_eq!(at(RulePosition::TopHalf), Some(RuleAction::Move(Rect::new(0, 0, 1920, 520))));
        assert_eq!(at(RulePosition::BottomHalf), Some(RuleAction::Move(Rect::new(0, 520, 1920, 521))));
        assert_eq!(at(RulePosition::Minimized), Some(RuleAction::State(WindowState::Minimized)));

        let mut on_missing = rule(Some("a.exe"), None, RulePosition::LeftHalf);
        on_missing.monitor = Some(4);
        assert_eq!(engine.action_for(&on_missing, &topology, &current), None);
    }

    #[test]
    fn test_apply_restores_before_moving() {
        let mut h = Harness::single_monitor();
        let w = live_at(1, "slack.exe", "Slack", "Slack", Rect::new(100, 100, 800, 600));
        h.system.add_live(&w, WindowState::Maximized);
        let rules = vec![rule(Some("slack.exe"), None, RulePosition::LeftHalf)];

        let applied = h.with_ctx(|ctx| {
            let topology = MonitorTopology::from_system(ctx.system);
            RuleEngine::new(&rules).apply(ctx, &topology, &[w.clone()])
        });

        assert_eq!(applied, 1);
        let calls = h.system.calls();
        assert_eq!(calls[0], Call::SetState(1, WindowState::Normal));
        assert!(matches!(calls[1], Call::Move(1, r) if r.x == 0 && r.y == 0 && r.width == 960));
    }

    #[test]
    fn test_rule_position_serde() {
        let r: Rule = serde_json::from_str(r#"{"exe":"a.exe","position":"right-half","monitor":2}"#).unwrap();
        assert_eq!(r.position, RulePosition::RightHalf);
        assert_eq!(r.monitor, Some(2));
        assert_eq!(r.title_contains, None);
    }
}
