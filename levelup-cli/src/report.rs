//! Terminal rendering of engine results.

use levelup_core::{
    Category, LevelChange, ReaperVerdict, Resolution, Resolver, Session, SubTask, Task, TickReport,
};

pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

pub fn level_notice(change: Option<LevelChange>) -> Option<String> {
    match change? {
        LevelChange::Up { from, to } => Some(format!("LEVEL UP! {from} -> {to}")),
        LevelChange::Down { from, to } => Some(format!("Level down... {from} -> {to}")),
    }
}

pub fn print_resolution(r: &Resolution) {
    let verb = match (r.resolver, r.task.is_failure) {
        (_, false) => "Quest complete!",
        (Resolver::User, true) => "Quest completed late.",
        (Resolver::Sweep, true) => "Quest failed: deadline passed.",
    };
    println!("{verb} {} ({:+} XP)", r.task.title, r.delta);
    if let Some(n) = level_notice(r.level_change) {
        println!("{n}");
    }
}

pub fn print_tick(report: &TickReport) {
    for r in &report.expired {
        print_resolution(r);
    }
    match report.reaper.verdict {
        ReaperVerdict::Penalized {
            penalty,
            attribute,
            consecutive_failures,
            completed_yesterday,
        } => {
            println!(
                "The Reaper came: only {completed_yesterday} quest(s) yesterday. -{penalty} XP from {attribute} (streak {consecutive_failures})"
            );
            if let Some(n) = level_notice(report.reaper.level_change) {
                println!("{n}");
            }
        }
        ReaperVerdict::Spared { completed_yesterday } => {
            println!("The Reaper passes you by ({completed_yesterday} quests yesterday).");
        }
        ReaperVerdict::AlreadyChecked => {}
    }
}

pub fn print_task_line(t: &Task) {
    let mut line = format!("  [{}] {} ({} XP, {})", short_id(&t.id), t.title, t.xp, t.attribute);
    if let Some(d) = t.deadline {
        line.push_str(&format!(" due {}", d.format("%Y-%m-%d %H:%M UTC")));
        if t.started_at.is_some() {
            line.push_str(" [armed]");
        }
    }
    println!("{line}");
    print_subtasks(&t.sub_tasks, 2);
}

fn print_subtasks(nodes: &[SubTask], depth: usize) {
    for n in nodes {
        let mark = if n.completed { "x" } else { " " };
        println!("{}- [{mark}] {} ({}) [{}]", "  ".repeat(depth), n.title, n.xp, n.id);
        print_subtasks(&n.sub_tasks, depth + 1);
    }
}

pub fn print_status(s: &Session) {
    let info = s.level_info();
    println!(
        "Level {} | {}/{} XP ({:.0}%) | total {} XP",
        info.level, info.xp_in_current_level, info.xp_for_next_level, info.progress, info.total_xp
    );

    println!("\nStats:");
    for stat in s.stats() {
        println!(
            "  {:<10} {:>3} pts  ({} XP, {}/{} to next)",
            stat.attribute.label(),
            stat.display_points,
            stat.cumulative_xp,
            stat.xp_toward_next_point,
            levelup_core::POINT_DIVISOR
        );
    }

    for (label, cat) in [("Daily quests", Category::Daily), ("Main quests", Category::Main)] {
        println!("\n{label}:");
        let tasks = s.active(cat);
        if tasks.is_empty() {
            println!("  (none)");
        }
        for t in tasks {
            print_task_line(t);
        }
    }

    let reaper = s.reaper_state();
    println!(
        "\nQuests completed: {} | Reaper streak: {}",
        s.quests_completed(),
        reaper.consecutive_failures
    );
}

pub fn print_history(s: &Session, limit: usize) {
    if s.history().is_empty() {
        println!("No quests completed yet.");
        return;
    }
    for t in s.history().iter().take(limit) {
        let when = t
            .completed_at
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let mark = if t.is_failure { "x" } else { "v" };
        println!("{mark} {when}  {:+} XP  {}", t.xp, t.title);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_describe_direction() {
        assert_eq!(level_notice(None), None);
        assert_eq!(
            level_notice(Some(LevelChange::Up { from: 2, to: 3 })).as_deref(),
            Some("LEVEL UP! 2 -> 3")
        );
        assert!(level_notice(Some(LevelChange::Down { from: 3, to: 2 })).unwrap().contains("down"));
    }

    #[test]
    fn short_id_handles_short_strings() {
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(short_id("0123456789abcdef"), "01234567");
    }
}
