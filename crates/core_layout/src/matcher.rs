//! Window identity matching across process restarts.
//!
//! Window handles do not survive a restart, so a saved entry is matched to a
//! live window by executable, class and title. The matcher prefers leaving an
//! entry unresolved (it is retried later) to relocating the wrong window.

use crate::model::WindowEntry;
use crate::snapshot::LiveWindow;
use crate::title::title_similarity;

/// Which narrowing pass produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPass {
    /// Executable and window class both equal.
    ExeAndClass,
    /// Executable only (class drifted between app versions).
    ExeOnly,
}

/// A live window chosen for a saved entry.
#[derive(Debug, Clone, Copy)]
pub struct Match<'c> {
    pub window: &'c LiveWindow,
    /// Title similarity, None when the candidate was unique.
    pub score: Option<u8>,
    pub pass: MatchPass,
}

/// Resolve the single best live window for `entry`, or none.
pub fn find_match<'c, I>(entry: &WindowEntry, candidates: I) -> Option<Match<'c>>
where
    I: IntoIterator<Item = &'c LiveWindow>,
{
    let same_exe: Vec<&LiveWindow> = candidates
        .into_iter()
        .filter(|c| {
            c.entry
                .process_exe_name
                .eq_ignore_ascii_case(&entry.process_exe_name)
        })
        .collect();

    let same_class: Vec<&LiveWindow> = same_exe
        .iter()
        .copied()
        .filter(|c| c.entry.window_class == entry.window_class)
        .collect();

    if !same_class.is_empty() {
        return disambiguate(entry, &same_class, MatchPass::ExeAndClass);
    }
    disambiguate(entry, &same_exe, MatchPass::ExeOnly)
}

fn disambiguate<'c>(
    entry: &WindowEntry,
    pool: &[&'c LiveWindow],
    pass: MatchPass,
) -> Option<Match<'c>> {
    match pool {
        [] => None,
        [only] => Some(Match {
            window: *only,
            score: None,
            pass,
        }),
        _ => {
            let mut best: Option<(&'c LiveWindow, u8)> = None;
            for candidate in pool {
                let score =
                    title_similarity(&entry.normalized_title, &candidate.entry.normalized_title);
                // Strictly greater: the first of equal scores wins.
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((*candidate, score));
                }
            }

            match best {
                Some((window, score)) if score > 0 => Some(Match {
                    window,
                    score: Some(score),
                    pass,
                }),
                _ => {
                    tracing::debug!(
                        exe = %entry.process_exe_name,
                        title = %entry.normalized_title,
                        candidates = pool.len(),
                        "No candidate title is similar enough; leaving entry unresolved"
                    );
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{entry, live};

    #[test]
    fn test_single_candidate_accepted_without_title() {
        let saved = entry("notepad.exe", "Notepad", "notes");
        let pool = vec![live(1, "NOTEPAD.EXE", "Notepad", "something else entirely")];
        let m = find_match(&saved, &pool).unwrap();
        assert_eq!(m.window.id, 1);
        assert_eq!(m.score, None);
        assert_eq!(m.pass, MatchPass::ExeAndClass);
    }

    #[test]
    fn test_chrome_tabs_disambiguated_by_title() {
        let saved = entry("chrome.exe", "Chrome_WidgetWin_1", "GitHub - item");
        let pool = vec![
            live(1, "chrome.exe", "Chrome_WidgetWin_1", "Gmail"),
            live(2, "chrome.exe", "Chrome_WidgetWin_1", "GitHub - item"),
        ];
        let m = find_match(&saved, &pool).unwrap();
        assert_eq!(m.window.id, 2);
        assert_eq!(m.score, Some(100));
    }

    #[test]
    fn test_zero_score_among_several_is_rejected() {
        let saved = entry("explorer.exe", "CabinetWClass", "Dropbox");
        let pool = vec![
            live(1, "explorer.exe", "CabinetWClass", "Downloads"),
            live(2, "explorer.exe", "CabinetWClass", "Documents"),
        ];
        assert!(find_match(&saved, &pool).is_none());
    }

    #[test]
    fn test_pass_two_relaxes_class() {
        let saved = entry("app.exe", "OldClass", "Main");
        let pool = vec![
            live(1, "other.exe", "OldClass", "Main"),
            live(2, "app.exe", "NewClass", "Main"),
        ];
        let m = find_match(&saved, &pool).unwrap();
        assert_eq!(m.window.id, 2);
        assert_eq!(m.pass, MatchPass::ExeOnly);
    }

    #[test]
    fn test_pass_two_not_used_when_pass_one_has_candidates() {
        // Pass 1 has two candidates with zero score; pass 2 must not rescue
        // the differently-classed window with an exact title.
        let saved = entry("app.exe", "Main", "Report");
        let pool = vec![
            live(1, "app.exe", "Main", "Alpha"),
            live(2, "app.exe", "Main", "Beta"),
            live(3, "app.exe", "Popup", "Report"),
        ];
        assert!(find_match(&saved, &pool).is_none());
    }

    #[test]
    fn test_tie_goes_to_first_candidate() {
        let saved = entry("code.exe", "Chrome_WidgetWin_1", "project");
        let pool = vec![
            live(5, "code.exe", "Chrome_WidgetWin_1", "project one"),
            live(6, "code.exe", "Chrome_WidgetWin_1", "project two"),
        ];
        assert_eq!(find_match(&saved, &pool).unwrap().window.id, 5);
    }

    #[test]
    fn test_no_candidates() {
        let saved = entry("code.exe", "X", "project");
        assert!(find_match(&saved, &Vec::<LiveWindow>::new()).is_none());
    }
}
