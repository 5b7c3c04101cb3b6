//! Direction selection.
//!
//! Given the scripts on disk, the executed set, and the two versions, decide
//! which way to migrate and exactly which scripts run, in order.
//!
//! Going up, a script qualifies when `database < tag <= server` and it has
//! not been executed yet.  Going down, a script qualifies when
//! `server < tag <= database`, whether or not its `up` was ever recorded: a
//! downgrade must be able to undo schema the bookkeeping lost track of, so
//! `down` operations have to tolerate running without their `up`.

use std::cmp::Ordering;
use std::collections::HashSet;

use schemagate_shared::{Direction, Version};

/// Ordered list of scripts to run in one direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    pub direction: Direction,
    /// Script names: ascending versions for `up`, descending for `down`.
    pub steps: Vec<String>,
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Direction to move from `database_version` to `server_version`, or `None`
/// when they are equal.
pub fn direction(database_version: &Version, server_version: &Version) -> Option<Direction> {
    match server_version.cmp(database_version) {
        Ordering::Greater => Some(Direction::Up),
        Ordering::Less => Some(Direction::Down),
        Ordering::Equal => None,
    }
}

/// Build the plan.  Returns `None` when the database is already at
/// `server_version`.
pub fn plan<'a, I>(
    scripts: I,
    executed: &HashSet<String>,
    database_version: &Version,
    server_version: &Version,
) -> Option<MigrationPlan>
where
    I: IntoIterator<Item = (&'a str, &'a Version)>,
{
    let direction = direction(database_version, server_version)?;

    let mut selected: Vec<(&str, &Version)> = scripts
        .into_iter()
        .filter(|(name, version)| match direction {
            Direction::Up => {
                *version > database_version
                    && *version <= server_version
                    && !executed.contains(*name)
            }
            Direction::Down => *version <= database_version && *version > server_version,
        })
        .collect();

    selected.sort_by(|a, b| a.1.cmp(b.1));
    if direction == Direction::Down {
        selected.reverse();
    }

    Some(MigrationPlan {
        direction,
        steps: selected.into_iter().map(|(name, _)| name.to_string()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn scripts() -> Vec<(String, Version)> {
        ["1.0.0", "1.1.0", "1.2.0", "1.3.0"]
            .iter()
            .map(|s| (format!("v{s}-migration"), v(s)))
            .collect()
    }

    fn run(
        scripts: &[(String, Version)],
        executed: &[&str],
        database: &str,
        server: &str,
    ) -> Option<MigrationPlan> {
        let executed: HashSet<String> = executed.iter().map(|s| s.to_string()).collect();
        plan(
            scripts.iter().map(|(n, v)| (n.as_str(), v)),
            &executed,
            &v(database),
            &v(server),
        )
    }

    #[test]
    fn test_equal_versions_is_noop() {
        assert_eq!(run(&scripts(), &[], "1.2.0", "1.2.0"), None);
    }

    #[test]
    fn test_up_plan() {
        let plan = run(&scripts(), &["v1.0.0-migration"], "1.0.0", "1.2.3").unwrap();
        assert_eq!(plan.direction, Direction::Up);
        assert_eq!(plan.steps, vec!["v1.1.0-migration", "v1.2.0-migration"]);
    }

    #[test]
    fn test_up_plan_skips_executed() {
        let plan = run(&scripts(), &["v1.1.0-migration"], "1.0.0", "1.3.0").unwrap();
        assert_eq!(plan.steps, vec!["v1.2.0-migration", "v1.3.0-migration"]);
    }

    #[test]
    fn test_down_plan_ignores_executed_set() {
        let all = [
            "v1.0.0-migration",
            "v1.1.0-migration",
            "v1.2.0-migration",
            "v1.3.0-migration",
        ];
        let none: &[&str] = &[];
        for executed in [&all[..], none] {
            let plan = run(&scripts(), executed, "1.3.0", "1.1.3").unwrap();
            assert_eq!(plan.direction, Direction::Down);
            assert_eq!(plan.steps, vec!["v1.3.0-migration", "v1.2.0-migration"]);
        }
    }

    #[test]
    fn test_full_rollback_includes_unexecuted() {
        let plan = run(&scripts(), &[], "1.0.0", "0.0.0").unwrap();
        assert_eq!(plan.direction, Direction::Down);
        assert_eq!(plan.steps, vec!["v1.0.0-migration"]);

        let plan = run(&scripts(), &[], "1.3.0", "0.0.0").unwrap();
        assert_eq!(
            plan.steps,
            vec![
                "v1.3.0-migration",
                "v1.2.0-migration",
                "v1.1.0-migration",
                "v1.0.0-migration"
            ]
        );
    }

    #[test]
    fn test_no_scripts_in_range() {
        let plan = run(&scripts(), &[], "1.3.0", "1.3.5").unwrap();
        assert!(plan.is_empty());
        let plan = run(&scripts(), &[], "1.3.5", "1.3.1").unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_server_between_migrations() {
        let plan = run(&scripts(), &[], "1.0.0", "1.1.5").unwrap();
        assert_eq!(plan.steps, vec!["v1.1.0-migration"]);

        let plan = run(&scripts(), &[], "1.2.5", "1.0.5").unwrap();
        assert_eq!(plan.steps, vec!["v1.2.0-migration", "v1.1.0-migration"]);
    }

    #[test]
    fn test_unpadded_versions_order_numerically() {
        let scripts = vec![
            ("v1.10.0-b".to_string(), v("1.10.0")),
            ("v1.9.0-a".to_string(), v("1.9.0")),
        ];
        let plan = run(&scripts, &[], "1.0.0", "2.0.0").unwrap();
        assert_eq!(plan.steps, vec!["v1.9.0-a", "v1.10.0-b"]);
    }
}
