//! 個別チェック（評価順に並べる）
//!
//! 各チェックは独立しており、該当すれば除外理由を返す。

use super::{GameFacts, RejectReason};
use crate::config::FilterConfig;
use crate::record::tail_chars;

/// 結果整合性チェックで見る本文末尾の文字数
pub const RESULT_TAIL_CHARS: usize = 40;

pub type Check = fn(&GameFacts<'_>, &FilterConfig) -> Option<RejectReason>;

/// 評価順。順序を変えると除外理由が変わるので注意。
pub static CHECKS: [Check; 17] = [
    missing_tags,
    no_moves,
    incomplete_result,
    termination_not_normal,
    bot_involved,
    anonymous_player,
    non_rated_event,
    white_rating_too_low,
    black_rating_too_low,
    rating_diff_too_high,
    increment_too_high,
    too_few_moves,
    event_not_in_modes,
    time_control_mismatch,
    base_time_out_of_range,
    binary_character,
    moves_result_mismatch,
];

/// 名前・称号に "bot" を含む
pub fn is_bot(name: &str) -> bool {
    name.to_lowercase().contains("bot")
}

/// 匿名・ゲスト。空の名前も匿名扱い。
pub fn is_anonymous(name: &str) -> bool {
    let s = name.trim().to_lowercase();
    s.is_empty() || s.starts_with("anon") || s.contains("anonymous") || s.contains("guest") || s == "-"
}

pub fn missing_tags(facts: &GameFacts<'_>, _: &FilterConfig) -> Option<RejectReason> {
    facts.attrs.is_empty().then_some(RejectReason::MissingTags)
}

pub fn no_moves(facts: &GameFacts<'_>, _: &FilterConfig) -> Option<RejectReason> {
    facts.body.is_empty().then_some(RejectReason::NoMoves)
}

pub fn incomplete_result(facts: &GameFacts<'_>, cfg: &FilterConfig) -> Option<RejectReason> {
    if !cfg.skip_incomplete {
        return None;
    }
    let result = facts.tag("Result");
    matches!(result.trim(), "" | "*").then(|| RejectReason::IncompleteResult {
        result: result.to_string(),
    })
}

pub fn termination_not_normal(facts: &GameFacts<'_>, cfg: &FilterConfig) -> Option<RejectReason> {
    if !cfg.skip_termination {
        return None;
    }
    let termination = facts.tag("Termination");
    let abnormal = !termination.is_empty() && !termination.trim().eq_ignore_ascii_case("normal");
    abnormal.then(|| RejectReason::TerminationNotNormal {
        termination: termination.to_string(),
    })
}

pub fn bot_involved(facts: &GameFacts<'_>, cfg: &FilterConfig) -> Option<RejectReason> {
    if !cfg.skip_bots {
        return None;
    }
    let (white, black) = (facts.tag("White"), facts.tag("Black"));
    let bot = is_bot(white)
        || is_bot(black)
        || is_bot(facts.tag("WhiteTitle"))
        || is_bot(facts.tag("BlackTitle"));
    bot.then(|| RejectReason::BotInvolved {
        white: white.to_string(),
        black: black.to_string(),
    })
}

pub fn anonymous_player(facts: &GameFacts<'_>, cfg: &FilterConfig) -> Option<RejectReason> {
    if !cfg.skip_anonymous {
        return None;
    }
    let (white, black) = (facts.tag("White"), facts.tag("Black"));
    (is_anonymous(white) || is_anonymous(black)).then(|| RejectReason::AnonymousPlayer {
        white: white.to_string(),
        black: black.to_string(),
    })
}

pub fn non_rated_event(facts: &GameFacts<'_>, cfg: &FilterConfig) -> Option<RejectReason> {
    if !cfg.skip_nonrated {
        return None;
    }
    let event = facts.tag("Event");
    (!event.is_empty() && !event.to_lowercase().contains("rated")).then(|| {
        RejectReason::NonRatedEvent {
            event: event.to_string(),
        }
    })
}

pub fn white_rating_too_low(facts: &GameFacts<'_>, cfg: &FilterConfig) -> Option<RejectReason> {
    (cfg.min_white != 0 && facts.white_elo < cfg.min_white).then_some(
        RejectReason::WhiteRatingTooLow {
            elo: facts.white_elo,
            min: cfg.min_white,
        },
    )
}

pub fn black_rating_too_low(facts: &GameFacts<'_>, cfg: &FilterConfig) -> Option<RejectReason> {
    (cfg.min_black != 0 && facts.black_elo < cfg.min_black).then_some(
        RejectReason::BlackRatingTooLow {
            elo: facts.black_elo,
            min: cfg.min_black,
        },
    )
}

/// `|diff| > max`。`i64::MIN` の絶対値は表現できないので常に超過扱い。
fn diff_exceeds(diff: i64, max: i64) -> bool {
    diff.checked_abs().is_none_or(|a| a > max)
}

pub fn rating_diff_too_high(facts: &GameFacts<'_>, cfg: &FilterConfig) -> Option<RejectReason> {
    let max = cfg.max_rating_diff?;
    if let Some(diff) = facts.white_rating_diff.filter(|&d| diff_exceeds(d, max)) {
        return Some(RejectReason::WhiteRatingDiffTooHigh { diff, max });
    }
    facts
        .black_rating_diff
        .filter(|&d| diff_exceeds(d, max))
        .map(|diff| RejectReason::BlackRatingDiffTooHigh { diff, max })
}

pub fn increment_too_high(facts: &GameFacts<'_>, cfg: &FilterConfig) -> Option<RejectReason> {
    let max = cfg.max_increment?;
    facts
        .increment
        .filter(|&inc| inc >= max)
        .map(|increment| RejectReason::IncrementTooHigh { increment, max })
}

pub fn too_few_moves(facts: &GameFacts<'_>, cfg: &FilterConfig) -> Option<RejectReason> {
    (cfg.min_moves != 0 && facts.full_moves < cfg.min_moves).then_some(RejectReason::TooFewMoves {
        moves: facts.full_moves,
        min: cfg.min_moves,
    })
}

pub fn event_not_in_modes(facts: &GameFacts<'_>, cfg: &FilterConfig) -> Option<RejectReason> {
    let modes = cfg.modes.as_ref()?;
    let event = facts.tag("Event");
    let lowered = event.to_lowercase();
    let allowed = modes.iter().any(|m| lowered.contains(&m.to_lowercase()));
    (!allowed).then(|| RejectReason::EventNotInModes {
        event: event.to_string(),
    })
}

pub fn time_control_mismatch(facts: &GameFacts<'_>, cfg: &FilterConfig) -> Option<RejectReason> {
    let required = cfg.timecontrol_exact.as_deref().filter(|s| !s.is_empty())?;
    let actual = facts.tag("TimeControl");
    (actual != required).then(|| RejectReason::TimeControlMismatch {
        actual: actual.to_string(),
        required: required.to_string(),
    })
}

pub fn base_time_out_of_range(facts: &GameFacts<'_>, cfg: &FilterConfig) -> Option<RejectReason> {
    let (min, max) = (cfg.time_min, cfg.time_max);
    if min.is_none() && max.is_none() {
        return None;
    }
    let out = match facts.base_time {
        None => true,
        Some(base) => min.is_some_and(|m| base < m) || max.is_some_and(|m| base > m),
    };
    out.then_some(RejectReason::BaseTimeOutOfRange {
        base: facts.base_time,
        min,
        max,
    })
}

pub fn binary_character(facts: &GameFacts<'_>, _: &FilterConfig) -> Option<RejectReason> {
    facts.raw.contains('\0').then_some(RejectReason::BinaryCharacter)
}

/// 本文末尾に Result が無ければ除外（ヒューリスティック）
pub fn moves_result_mismatch(facts: &GameFacts<'_>, _: &FilterConfig) -> Option<RejectReason> {
    let result = facts.tag("Result").trim();
    if result.is_empty() || result == "*" {
        return None;
    }
    let tail = tail_chars(facts.body, RESULT_TAIL_CHARS);
    (!tail.contains(result)).then(|| RejectReason::MovesResultMismatch {
        result: result.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::AttributeSet;

    fn facts_with<'a>(attrs: &'a AttributeSet, body: &'a str, raw: &'a str) -> GameFacts<'a> {
        GameFacts::derive(raw, attrs, body)
    }

    fn attrs(pairs: &[(&str, &str)]) -> AttributeSet {
        pairs.iter().copied().collect()
    }

    #[test]
    fn bot_heuristic_checks_names_and_titles() {
        let cfg = FilterConfig::default();
        let a = attrs(&[("White", "alice"), ("Black", "carol"), ("BlackTitle", "BOT")]);
        let f = facts_with(&a, "1. e4 1-0", "");
        assert!(matches!(bot_involved(&f, &cfg), Some(RejectReason::BotInvolved { .. })));

        let off = FilterConfig { skip_bots: false, ..cfg };
        assert_eq!(bot_involved(&f, &off), None);
    }

    #[test]
    fn anonymous_heuristic() {
        assert!(is_anonymous("Anonymous"));
        assert!(is_anonymous("anon123"));
        assert!(is_anonymous("Guest42"));
        assert!(is_anonymous("-"));
        assert!(is_anonymous(""));
        assert!(!is_anonymous("canon"));
        assert!(!is_anonymous("magnus"));
    }

    #[test]
    fn termination_is_case_insensitive() {
        let cfg = FilterConfig::default();
        let normal = attrs(&[("Termination", "NORMAL")]);
        assert_eq!(termination_not_normal(&facts_with(&normal, "x", ""), &cfg), None);
        let timeout = attrs(&[("Termination", "Time forfeit")]);
        assert_eq!(
            termination_not_normal(&facts_with(&timeout, "x", ""), &cfg),
            Some(RejectReason::TerminationNotNormal { termination: "Time forfeit".into() })
        );
        let absent = attrs(&[("White", "a")]);
        assert_eq!(termination_not_normal(&facts_with(&absent, "x", ""), &cfg), None);
    }

    #[test]
    fn non_rated_event_requires_event_tag() {
        let cfg = FilterConfig::default();
        let casual = attrs(&[("Event", "Casual Blitz game")]);
        assert!(non_rated_event(&facts_with(&casual, "x", ""), &cfg).is_some());
        let rated = attrs(&[("Event", "Rated Rapid game")]);
        assert_eq!(non_rated_event(&facts_with(&rated, "x", ""), &cfg), None);
        let none = attrs(&[("White", "a")]);
        assert_eq!(non_rated_event(&facts_with(&none, "x", ""), &cfg), None);
    }

    #[test]
    fn rating_diff_checks_white_before_black() {
        let cfg = FilterConfig::default();
        let a = attrs(&[("WhiteRatingDiff", "+151"), ("BlackRatingDiff", "-200")]);
        assert_eq!(
            rating_diff_too_high(&facts_with(&a, "x", ""), &cfg),
            Some(RejectReason::WhiteRatingDiffTooHigh { diff: 151, max: 150 })
        );
        let b = attrs(&[("WhiteRatingDiff", "+150"), ("BlackRatingDiff", "-200")]);
        assert_eq!(
            rating_diff_too_high(&facts_with(&b, "x", ""), &cfg),
            Some(RejectReason::BlackRatingDiffTooHigh { diff: -200, max: 150 })
        );
        let missing = attrs(&[("White", "a")]);
        assert_eq!(rating_diff_too_high(&facts_with(&missing, "x", ""), &cfg), None);
    }

    #[test]
    fn rating_diff_at_integer_extremes_is_rejected_without_overflow() {
        let cfg = FilterConfig::default();
        let min = attrs(&[("WhiteRatingDiff", "-9223372036854775808")]);
        assert_eq!(
            rating_diff_too_high(&facts_with(&min, "x", ""), &cfg),
            Some(RejectReason::WhiteRatingDiffTooHigh { diff: i64::MIN, max: 150 })
        );
        let max = attrs(&[("BlackRatingDiff", "+9223372036854775807")]);
        assert_eq!(
            rating_diff_too_high(&facts_with(&max, "x", ""), &cfg),
            Some(RejectReason::BlackRatingDiffTooHigh { diff: i64::MAX, max: 150 })
        );
        // 負の上限ではどの変動も超過
        let negative = FilterConfig { max_rating_diff: Some(-1), ..FilterConfig::default() };
        let zero = attrs(&[("WhiteRatingDiff", "0")]);
        assert!(rating_diff_too_high(&facts_with(&zero, "x", ""), &negative).is_some());
    }

    #[test]
    fn increment_limit_is_inclusive() {
        let cfg = FilterConfig::default();
        let at = attrs(&[("TimeControl", "60+31")]);
        assert!(increment_too_high(&facts_with(&at, "x", ""), &cfg).is_some());
        let below = attrs(&[("TimeControl", "60+30")]);
        assert_eq!(increment_too_high(&facts_with(&below, "x", ""), &cfg), None);
        let none = FilterConfig { max_increment: None, ..FilterConfig::default() };
        assert_eq!(increment_too_high(&facts_with(&at, "x", ""), &none), None);
    }

    #[test]
    fn too_few_moves_uses_full_move_count() {
        let cfg = FilterConfig { min_moves: 3, ..FilterConfig::default() };
        let a = attrs(&[("White", "a")]);
        assert_eq!(
            too_few_moves(&facts_with(&a, "1. e4 e5 2. Nf3 1-0", ""), &cfg),
            Some(RejectReason::TooFewMoves { moves: 2, min: 3 })
        );
        assert_eq!(too_few_moves(&facts_with(&a, "1. e4 e5 2. Nf3 Nc6 3. Bb5 1-0", ""), &cfg), None);
    }

    #[test]
    fn modes_match_event_substrings() {
        let cfg = FilterConfig {
            modes: Some(vec!["blitz".into(), "Rapid".into()]),
            ..FilterConfig::default()
        };
        let rapid = attrs(&[("Event", "Rated RAPID game")]);
        assert_eq!(event_not_in_modes(&facts_with(&rapid, "x", ""), &cfg), None);
        let bullet = attrs(&[("Event", "Rated Bullet game")]);
        assert!(event_not_in_modes(&facts_with(&bullet, "x", ""), &cfg).is_some());
        let no_event = attrs(&[("White", "a")]);
        assert!(event_not_in_modes(&facts_with(&no_event, "x", ""), &cfg).is_some());
    }

    #[test]
    fn exact_time_control() {
        let cfg = FilterConfig {
            timecontrol_exact: Some("600+0".into()),
            ..FilterConfig::default()
        };
        let same = attrs(&[("TimeControl", "600+0")]);
        assert_eq!(time_control_mismatch(&facts_with(&same, "x", ""), &cfg), None);
        let other = attrs(&[("TimeControl", "600+5")]);
        assert!(time_control_mismatch(&facts_with(&other, "x", ""), &cfg).is_some());
    }

    #[test]
    fn base_time_bounds() {
        let cfg = FilterConfig {
            time_min: Some(180),
            time_max: Some(600),
            ..FilterConfig::default()
        };
        let inside = attrs(&[("TimeControl", "300+2")]);
        assert_eq!(base_time_out_of_range(&facts_with(&inside, "x", ""), &cfg), None);
        let fast = attrs(&[("TimeControl", "60+0")]);
        assert_eq!(
            base_time_out_of_range(&facts_with(&fast, "x", ""), &cfg),
            Some(RejectReason::BaseTimeOutOfRange { base: Some(60), min: Some(180), max: Some(600) })
        );
        let unknown = attrs(&[("TimeControl", "-")]);
        assert!(base_time_out_of_range(&facts_with(&unknown, "x", ""), &cfg).is_some());
        let only_max = FilterConfig { time_max: Some(600), ..FilterConfig::default() };
        assert_eq!(base_time_out_of_range(&facts_with(&fast, "x", ""), &only_max), None);
    }

    #[test]
    fn null_byte_is_rejected() {
        let a = attrs(&[("White", "a")]);
        let f = facts_with(&a, "1. e4 1-0", "[White \"a\"]\n\n1. e4\0 1-0\n");
        assert_eq!(binary_character(&f, &FilterConfig::default()), Some(RejectReason::BinaryCharacter));
    }

    #[test]
    fn result_must_appear_near_end_of_moves() {
        let cfg = FilterConfig::default();
        let a = attrs(&[("Result", "0-1")]);
        assert_eq!(moves_result_mismatch(&facts_with(&a, "1. e4 e5 0-1", ""), &cfg), None);
        assert!(moves_result_mismatch(&facts_with(&a, "1. e4 e5 1-0", ""), &cfg).is_some());
        let star = attrs(&[("Result", "*")]);
        assert_eq!(moves_result_mismatch(&facts_with(&star, "1. e4", ""), &cfg), None);
    }
}
