/// Shell-style file name match supporting `*` (any run) and `?` (one char).
/// No character classes and no path semantics: `*` also matches `/`.
pub fn glob_matches(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();

    let (mut pi, mut ni) = (0usize, 0usize);
    // Position of the last `*` seen and the name index it is currently absorbing up to.
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ni));
            pi += 1;
        } else if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if let Some((star_pi, star_ni)) = star {
            pi = star_pi + 1;
            ni = star_ni + 1;
            star = Some((star_pi, star_ni + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_and_question_mark() {
        assert!(glob_matches("*verifier*", "network-verifier-2024.log"));
        assert!(glob_matches("*verifier*", "verifier"));
        assert!(!glob_matches("*verifier*", "log.txt"));
        assert!(glob_matches("run-?.log", "run-1.log"));
        assert!(!glob_matches("run-?.log", "run-10.log"));
        assert!(glob_matches("*", ""));
        assert!(!glob_matches("a", ""));
        assert!(glob_matches("*", "*x"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert!(!glob_matches("*verifier*", "VERIFIER.log"));
    }

    #[test]
    fn backtracks_over_repeated_prefixes() {
        assert!(glob_matches("*ab*ab", "xxabyyabab"));
        assert!(!glob_matches("*ab*ab", "xxabyyab-"));
    }
}
