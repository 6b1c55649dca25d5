#![forbid(unsafe_code)]

//! Command line and environment configuration for `chorectl`.

use cb_core::{
    AssignmentId, AssignmentMode, FamilyId, MemberId, Money, Recurrence, RewardPolicy, Role,
    TemplateId, ValidationError,
};
use cb_storage::{ApproveItem, StoreConfig};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "chorectl")]
#[command(about = "Chore assignment, approval and allowance ledger")]
pub struct Cli {
    /// Directory holding the chore database
    #[arg(long, env = "CHOREBOARD_STORAGE_DIR", default_value = ".choreboard", global = true)]
    pub storage_dir: PathBuf,

    /// Clock override in epoch milliseconds, for reproducible runs
    #[arg(long, env = "CHOREBOARD_NOW_MS", global = true)]
    pub now_ms: Option<i64>,

    /// How long to wait for another writer, in milliseconds
    #[arg(long, env = "CHOREBOARD_BUSY_TIMEOUT_MS", default_value = "5000", global = true)]
    pub busy_timeout_ms: u64,

    /// Log filter directive (falls back to RUST_LOG)
    #[arg(long, env = "CHOREBOARD_LOG", global = true)]
    pub log: Option<String>,

    /// Indent JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Family membership
    Member {
        #[command(subcommand)]
        command: MemberCommand,
    },
    /// Chore templates
    Template {
        #[command(subcommand)]
        command: TemplateCommand,
    },
    /// Chores a member can complete right now
    Available {
        #[arg(value_parser = parse_member)]
        member: MemberId,
    },
    /// Completed work waiting for a parent
    Pending {
        #[arg(long, value_parser = parse_family)]
        family: FamilyId,
    },
    /// One assignment with its template
    Show {
        #[arg(value_parser = parse_assignment)]
        assignment: AssignmentId,
    },
    /// Mark an assignment done, or claim a pool chore
    Complete {
        #[arg(long, value_parser = parse_member)]
        actor: MemberId,
        #[arg(long, value_parser = parse_assignment, conflicts_with = "pool", required_unless_present = "pool")]
        assignment: Option<AssignmentId>,
        /// Pool template to claim
        #[arg(long, value_parser = parse_template)]
        pool: Option<TemplateId>,
    },
    /// Approve completed work
    Approve {
        #[arg(long, value_parser = parse_member)]
        actor: MemberId,
        #[arg(value_parser = parse_assignment)]
        assignment: AssignmentId,
        /// Amount for range rewards
        #[arg(long, value_parser = parse_money)]
        reward: Option<Money>,
    },
    /// Approve several assignments; each item is `ASSIGNMENT` or `ASSIGNMENT=AMOUNT`
    ApproveMany {
        #[arg(long, value_parser = parse_member)]
        actor: MemberId,
        #[arg(required = true, value_parser = parse_approve_item)]
        items: Vec<ApproveItem>,
    },
    /// Send completed work back with a reason
    Reject {
        #[arg(long, value_parser = parse_member)]
        actor: MemberId,
        #[arg(value_parser = parse_assignment)]
        assignment: AssignmentId,
        #[arg(long)]
        reason: String,
    },
    /// Reject several assignments with one reason
    RejectMany {
        #[arg(long, value_parser = parse_member)]
        actor: MemberId,
        #[arg(required = true, value_parser = parse_assignment)]
        assignments: Vec<AssignmentId>,
        #[arg(long)]
        reason: String,
    },
    /// Manual signed correction to a member's balance
    Adjust {
        #[arg(long, value_parser = parse_member)]
        actor: MemberId,
        #[arg(long, value_parser = parse_member)]
        child: MemberId,
        #[arg(long, value_parser = parse_money, allow_hyphen_values = true)]
        amount: Money,
        #[arg(long)]
        reason: String,
    },
    /// Record money handed out
    Payout {
        #[arg(long, value_parser = parse_member)]
        actor: MemberId,
        #[arg(long, value_parser = parse_member)]
        child: MemberId,
        #[arg(long, value_parser = parse_money)]
        amount: Money,
        #[arg(long)]
        note: Option<String>,
    },
    /// Balance breakdown for a member
    Balance {
        #[arg(value_parser = parse_member)]
        member: MemberId,
        /// Include the reward, adjustment and payout entries
        #[arg(long)]
        entries: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum MemberCommand {
    Add {
        #[arg(value_parser = parse_member)]
        member: MemberId,
        #[arg(long, value_parser = parse_family)]
        family: FamilyId,
        #[arg(long, value_enum)]
        role: RoleArg,
    },
    Show {
        #[arg(value_parser = parse_member)]
        member: MemberId,
    },
}

#[derive(Subcommand, Debug)]
pub enum TemplateCommand {
    Create {
        #[arg(long, value_parser = parse_member)]
        actor: MemberId,
        #[arg(long, value_parser = parse_family)]
        family: FamilyId,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[command(flatten)]
        mode: ModeArgs,
        #[command(flatten)]
        reward: RewardArgs,
        /// Days between approvals; omit for a one-time chore
        #[arg(long)]
        cooldown_days: Option<u32>,
    },
    Update {
        #[arg(long, value_parser = parse_member)]
        actor: MemberId,
        #[arg(value_parser = parse_template)]
        template: TemplateId,
        #[arg(long)]
        expected_revision: Option<i64>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        #[arg(long = "assignee", value_parser = parse_member)]
        assignees: Vec<MemberId>,
        #[command(flatten)]
        reward: RewardArgs,
        #[arg(long, conflicts_with = "one_time")]
        cooldown_days: Option<u32>,
        /// Turn a recurring chore into a one-time chore
        #[arg(long)]
        one_time: bool,
    },
    Disable {
        #[arg(long, value_parser = parse_member)]
        actor: MemberId,
        #[arg(value_parser = parse_template)]
        template: TemplateId,
    },
    Enable {
        #[arg(long, value_parser = parse_member)]
        actor: MemberId,
        #[arg(value_parser = parse_template)]
        template: TemplateId,
    },
    Get {
        #[arg(value_parser = parse_template)]
        template: TemplateId,
        /// Include the template's live assignments
        #[arg(long)]
        assignments: bool,
    },
    List {
        #[arg(long, value_parser = parse_family)]
        family: FamilyId,
        /// Include disabled templates
        #[arg(long)]
        all: bool,
    },
}

#[derive(Args, Debug)]
pub struct ModeArgs {
    #[arg(long, value_enum)]
    pub mode: ModeArg,
    #[arg(long = "assignee", value_parser = parse_member)]
    pub assignees: Vec<MemberId>,
}

impl ModeArgs {
    pub fn resolve(&self) -> Result<AssignmentMode, ValidationError> {
        AssignmentMode::from_parts(self.mode.wire_name(), self.assignees.clone())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Single,
    MultiIndependent,
    UnassignedPool,
}

impl ModeArg {
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::MultiIndependent => "multiIndependent",
            Self::UnassignedPool => "unassignedPool",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Parent,
    Child,
}

impl From<RoleArg> for Role {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Parent => Role::Parent,
            RoleArg::Child => Role::Child,
        }
    }
}

#[derive(Args, Debug)]
pub struct RewardArgs {
    /// Fixed reward amount
    #[arg(long, value_parser = parse_money, conflicts_with_all = ["reward_min", "reward_max"])]
    pub reward: Option<Money>,
    /// Lower bound of a range reward
    #[arg(long, value_parser = parse_money, requires = "reward_max")]
    pub reward_min: Option<Money>,
    /// Upper bound of a range reward
    #[arg(long, value_parser = parse_money, requires = "reward_min")]
    pub reward_max: Option<Money>,
}

impl RewardArgs {
    /// `None` when no reward flag was given.
    pub fn resolve(&self) -> Result<Option<RewardPolicy>, ValidationError> {
        match (self.reward, self.reward_min, self.reward_max) {
            (Some(amount), _, _) => RewardPolicy::fixed(amount).map(Some),
            (None, Some(min), Some(max)) => RewardPolicy::range(min, max).map(Some),
            _ => Ok(None),
        }
    }
}

pub fn recurrence_from(cooldown_days: Option<u32>) -> Result<Recurrence, ValidationError> {
    match cooldown_days {
        Some(days) => Recurrence::recurring(days),
        None => Ok(Recurrence::one_time()),
    }
}

fn parse_member(raw: &str) -> Result<MemberId, String> {
    MemberId::try_new(raw.trim()).map_err(|err| err.to_string())
}

fn parse_family(raw: &str) -> Result<FamilyId, String> {
    FamilyId::try_new(raw.trim()).map_err(|err| err.to_string())
}

fn parse_template(raw: &str) -> Result<TemplateId, String> {
    TemplateId::try_new(raw.trim()).map_err(|err| err.to_string())
}

fn parse_assignment(raw: &str) -> Result<AssignmentId, String> {
    AssignmentId::try_new(raw.trim()).map_err(|err| err.to_string())
}

fn parse_money(raw: &str) -> Result<Money, String> {
    Money::parse(raw).map_err(|err| err.to_string())
}

fn parse_approve_item(raw: &str) -> Result<ApproveItem, String> {
    let (id, amount) = match raw.split_once('=') {
        Some((id, amount)) => (id, Some(parse_money(amount)?)),
        None => (raw, None),
    };
    Ok(ApproveItem {
        assignment_id: parse_assignment(id)?,
        chosen_reward: amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("chorectl").chain(args.iter().copied()))
    }

    #[test]
    fn global_flags_apply_after_the_subcommand() {
        let cli = parse(&[
            "balance",
            "ann",
            "--storage-dir",
            "/tmp/chores",
            "--now-ms",
            "42",
            "--pretty",
        ])
        .expect("parse");
        assert_eq!(cli.storage_dir, PathBuf::from("/tmp/chores"));
        assert_eq!(cli.now_ms, Some(42));
        assert!(cli.pretty);
        assert_eq!(cli.store_config().busy_timeout, Duration::from_secs(5));
        assert!(matches!(cli.command, Command::Balance { entries: false, .. }));
    }

    #[test]
    fn template_create_builds_mode_reward_and_recurrence() {
        let cli = parse(&[
            "template",
            "create",
            "--actor",
            "mom",
            "--family",
            "smith",
            "--title",
            "Homework",
            "--mode",
            "multi-independent",
            "--assignee",
            "ann",
            "--assignee",
            "bob",
            "--reward-min",
            "3",
            "--reward-max",
            "10",
            "--cooldown-days",
            "7",
        ])
        .expect("parse");
        let Command::Template {
            command:
                TemplateCommand::Create {
                    mode,
                    reward,
                    cooldown_days,
                    ..
                },
        } = cli.command
        else {
            panic!("expected template create");
        };
        assert_eq!(
            mode.resolve().expect("mode"),
            AssignmentMode::MultiIndependent {
                assignees: vec![
                    MemberId::try_new("ann").unwrap(),
                    MemberId::try_new("bob").unwrap()
                ],
            }
        );
        assert_eq!(
            reward.resolve().expect("reward"),
            Some(RewardPolicy::range(Money::from_cents(300), Money::from_cents(1000)).unwrap())
        );
        assert_eq!(
            recurrence_from(cooldown_days).expect("recurrence"),
            Recurrence::recurring(7).unwrap()
        );
    }

    #[test]
    fn conflicting_reward_flags_are_refused() {
        let err = parse(&[
            "template",
            "create",
            "--actor",
            "mom",
            "--family",
            "smith",
            "--title",
            "Dishes",
            "--mode",
            "single",
            "--assignee",
            "ann",
            "--reward",
            "1",
            "--reward-min",
            "1",
            "--reward-max",
            "2",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn complete_needs_exactly_one_target() {
        assert!(parse(&["complete", "--actor", "ann"]).is_err());
        assert!(
            parse(&[
                "complete",
                "--actor",
                "ann",
                "--assignment",
                "ASN-0001",
                "--pool",
                "CHORE-0001"
            ])
            .is_err()
        );
        let cli = parse(&["complete", "--actor", "ann", "--pool", "CHORE-0001"]).expect("parse");
        assert!(matches!(
            cli.command,
            Command::Complete {
                assignment: None,
                pool: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn approve_many_items_carry_optional_amounts() {
        let cli = parse(&[
            "approve-many",
            "--actor",
            "mom",
            "ASN-0001",
            "ASN-0002=7.50",
        ])
        .expect("parse");
        let Command::ApproveMany { items, .. } = cli.command else {
            panic!("expected approve-many");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].chosen_reward, None);
        assert_eq!(items[1].chosen_reward, Some(Money::from_cents(750)));
    }

    #[test]
    fn malformed_values_fail_at_parse_time() {
        assert!(parse(&["payout", "--actor", "mom", "--child", "ann", "--amount", "1.005"]).is_err());
        assert!(parse(&["available", "-ann"]).is_err());
        let cli = parse(&[
            "adjust", "--actor", "mom", "--child", "ann", "--amount", "-2.5", "--reason", "cup",
        ])
        .expect("negative adjustment");
        assert!(matches!(cli.command, Command::Adjust { amount, .. } if amount == Money::from_cents(-250)));
    }
}
