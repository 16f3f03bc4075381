//! Flow filtering.
//!
//! The rule language proper lives with the configuration; the collector only
//! depends on the evaluation contract implemented here: a rule list is a
//! total function from a flow record to accept-or-discard, with an optional
//! tag on accept. Rules evaluate in order and the last matching rule wins,
//! unless a matching rule is marked `quick`, which ends evaluation on the
//! spot. A flow no rule matches is accepted untagged.

use crate::flow::FlowRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Accept,
    Discard,
}

/// One filter rule. Every match field is optional; an omitted field matches
/// anything.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FilterRule {
    pub action: Action,
    /// Stop evaluating on match instead of letting later rules override.
    #[serde(default)]
    pub quick: bool,
    /// Tag stored with the flow when this rule decides an accept.
    #[serde(default)]
    pub tag: Option<u32>,
    #[serde(default)]
    pub agent: Option<IpAddr>,
    #[serde(default)]
    pub src: Option<IpAddr>,
    #[serde(default)]
    pub dst: Option<IpAddr>,
    #[serde(default)]
    pub src_port: Option<u16>,
    #[serde(default)]
    pub dst_port: Option<u16>,
    #[serde(default)]
    pub proto: Option<u8>,
    #[serde(default)]
    pub tos: Option<u8>,
}

impl FilterRule {
    fn matches(&self, flow: &FlowRecord) -> bool {
        fn wanted<T: PartialEq>(rule_field: &Option<T>, flow_field: &T) -> bool {
            match rule_field {
                Some(want) => want == flow_field,
                None => true,
            }
        }
        wanted(&self.agent, &flow.agent_addr)
            && wanted(&self.src, &flow.src_addr)
            && wanted(&self.dst, &flow.dst_addr)
            && wanted(&self.src_port, &flow.src_port)
            && wanted(&self.dst_port, &flow.dst_port)
            && wanted(&self.proto, &flow.proto)
            && wanted(&self.tos, &flow.tos)
    }
}

impl fmt::Display for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action {
            Action::Accept => write!(f, "accept")?,
            Action::Discard => write!(f, "discard")?,
        }
        if self.quick {
            write!(f, " quick")?;
        }
        if let Some(agent) = &self.agent {
            write!(f, " agent {agent}")?;
        }
        if let Some(src) = &self.src {
            write!(f, " src {src}")?;
        }
        if let Some(dst) = &self.dst {
            write!(f, " dst {dst}")?;
        }
        if let Some(port) = self.src_port {
            write!(f, " src-port {port}")?;
        }
        if let Some(port) = self.dst_port {
            write!(f, " dst-port {port}")?;
        }
        if let Some(proto) = self.proto {
            write!(f, " proto {proto}")?;
        }
        if let Some(tos) = self.tos {
            write!(f, " tos {tos:#04x}")?;
        }
        if let Some(tag) = self.tag {
            write!(f, " tag {tag}")?;
        }
        Ok(())
    }
}

/// Outcome of running a flow through the rule list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept { tag: Option<u32> },
    Discard,
}

/// Emits one line per rule to the log sink plus an aggregate line, for the
/// info control action.
pub fn dump(rules: &[FilterRule]) {
    info!(rules = rules.len(), "filter rules");
    for (index, rule) in rules.iter().enumerate() {
        info!(index, rule = %rule, "filter rule");
    }
}

/// Evaluates `flow` against `rules`. Never mutates either.
pub fn evaluate(flow: &FlowRecord, rules: &[FilterRule]) -> Verdict {
    let mut verdict = Verdict::Accept { tag: None };
    for rule in rules {
        if !rule.matches(flow) {
            continue;
        }
        verdict = match rule.action {
            Action::Accept => Verdict::Accept { tag: rule.tag },
            Action::Discard => Verdict::Discard,
        };
        if rule.quick {
            break;
        }
    }
    verdict
}
