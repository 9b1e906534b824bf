//! Report strategies as data.
//!
//! A [`PhasePlan`] lists the sessions to run, whether they share one growing
//! conversation, how often to repeat them, and how to produce the report.
//! The engine interprets any plan the same way.

use super::prompts;
use super::Strategy;

/// Loop ceiling for the agent-loop strategy.
pub const MAX_AGENT_LOOP_ITERATIONS: usize = 20;

/// Synthesis call settings for the cited report.
pub const SYNTHESIS_MAX_TOKENS: u32 = 8191;
pub const SYNTHESIS_TEMPERATURE: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversation {
    /// Each phase starts from its own system and user prompts.
    Fresh,
    /// Phases run as agents over one running input list.
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolAccess {
    Roster,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutput {
    /// Free text, stored as `{name}_output` for later templates.
    Narrative,
    /// A JSON [`super::EvaluatorVerdict`] that decides whether to repeat.
    Verdict,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSpec {
    pub name: &'static str,
    pub system: Option<&'static str>,
    pub user: Option<&'static str>,
    pub tools: ToolAccess,
    pub output: PhaseOutput,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Finish {
    /// The last narrative phase's output is the report.
    LastNarrative,
    /// One citation-aware completion over the phase outputs and every tool
    /// result packaged as a document.
    CitedSynthesis {
        system: &'static str,
        user: &'static str,
    },
    /// A final agent over the whole running input.
    ReportAgent(PhaseSpec),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallCount {
    /// Number of recorded tool invocations.
    Trace,
    /// Distinct call ids in the report agent's input.
    DistinctCallIds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMessage {
    Fixed(&'static str),
    /// Fixed prefix followed by the error text.
    WithError(&'static str),
}

impl FailureMessage {
    pub fn render(&self, err: &anyhow::Error) -> String {
        match self {
            Self::Fixed(message) => message.to_string(),
            Self::WithError(prefix) => format!("{}{:#}", prefix, err),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhasePlan {
    pub name: &'static str,
    pub conversation: Conversation,
    /// First user item of a running conversation.
    pub initial_input: Option<&'static str>,
    pub phases: Vec<PhaseSpec>,
    /// Repeat the phases up to this many times while verdicts ask for more.
    pub max_iterations: Option<usize>,
    pub finish: Finish,
    pub count: CallCount,
    pub failure: FailureMessage,
}

impl PhasePlan {
    pub fn for_strategy(strategy: Strategy) -> Self {
        match strategy {
            Strategy::SinglePass => Self::single_pass(),
            Strategy::ThreePhase => Self::three_phase(),
            Strategy::AgentLoop => Self::agent_loop(),
        }
    }

    pub fn single_pass() -> Self {
        Self {
            name: "single-pass",
            conversation: Conversation::Fresh,
            initial_input: None,
            phases: vec![PhaseSpec {
                name: "analyst",
                system: None,
                user: Some(prompts::SINGLE_PASS_USER),
                tools: ToolAccess::Roster,
                output: PhaseOutput::Narrative,
            }],
            max_iterations: None,
            finish: Finish::LastNarrative,
            count: CallCount::Trace,
            failure: FailureMessage::Fixed("Error in generating report from question"),
        }
    }

    pub fn three_phase() -> Self {
        Self {
            name: "three-phase",
            conversation: Conversation::Fresh,
            initial_input: None,
            phases: vec![
                PhaseSpec {
                    name: "analyst",
                    system: Some(prompts::ANALYST_SYSTEM),
                    user: Some(prompts::ANALYST_USER),
                    tools: ToolAccess::Roster,
                    output: PhaseOutput::Narrative,
                },
                PhaseSpec {
                    name: "evaluator",
                    system: Some(prompts::EVALUATOR_SYSTEM),
                    user: Some(prompts::EVALUATOR_USER),
                    tools: ToolAccess::Roster,
                    output: PhaseOutput::Narrative,
                },
            ],
            max_iterations: None,
            finish: Finish::CitedSynthesis {
                system: prompts::SYNTHESIS_SYSTEM,
                user: prompts::SYNTHESIS_USER,
            },
            count: CallCount::Trace,
            failure: FailureMessage::WithError("Error in multi-agent report generation: "),
        }
    }

    pub fn agent_loop() -> Self {
        Self {
            name: "agent-loop",
            conversation: Conversation::Running,
            initial_input: Some(prompts::LOOP_INITIAL_INPUT),
            phases: vec![
                PhaseSpec {
                    name: "analyst",
                    system: Some(prompts::LOOP_ANALYST),
                    user: None,
                    tools: ToolAccess::Roster,
                    output: PhaseOutput::Narrative,
                },
                PhaseSpec {
                    name: "evaluator",
                    system: Some(prompts::LOOP_EVALUATOR),
                    user: None,
                    tools: ToolAccess::None,
                    output: PhaseOutput::Verdict,
                },
            ],
            max_iterations: Some(MAX_AGENT_LOOP_ITERATIONS),
            finish: Finish::ReportAgent(PhaseSpec {
                name: "report",
                system: Some(prompts::LOOP_REPORT),
                user: None,
                tools: ToolAccess::None,
                output: PhaseOutput::Narrative,
            }),
            count: CallCount::DistinctCallIds,
            failure: FailureMessage::Fixed("Error in generating report with agents"),
        }
    }
}
