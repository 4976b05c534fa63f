use crate::config::{RoleFilterConfig, SourceConfig};
use crate::normalize::{any_keyword_in_text, keyword_in_text};
use crate::types::{JobPosting, TitleGroupsMode};

// ============================================
// Title Groups
// ============================================

/// A group matches when any of its keywords occurs in the title.
fn group_matches(title: &str, group: &[String]) -> bool {
    group.iter().any(|kw| keyword_in_text(title, kw))
}

/// Combine title groups under `mode`. Empty groups are ignored, and with
/// no keywords left at all every title passes.
pub fn title_groups_match(title: &str, groups: &[Vec<String>], mode: TitleGroupsMode) -> bool {
    let mut groups = groups.iter().filter(|g| !g.is_empty()).peekable();
    if groups.peek().is_none() {
        return true;
    }
    match mode {
        TitleGroupsMode::All => groups.all(|g| group_matches(title, g)),
        TitleGroupsMode::Any => groups.any(|g| group_matches(title, g)),
    }
}

// ============================================
// Role / Employment Filtering
// ============================================

/// Decide whether a single posting passes the role filter.
///
/// Checks run in a fixed order: title exclusions, title groups, employment
/// exclusions, employment inclusions. The employment probe is the job type
/// followed by the title because some boards only put the basis in the title.
pub fn matches_role(posting: &JobPosting, role: &RoleFilterConfig) -> bool {
    let title = posting.job_title.as_str();

    if any_keyword_in_text(title, &role.title_exclude) {
        return false;
    }

    if !title_groups_match(title, &role.title_groups, role.title_groups_mode) {
        return false;
    }

    let employment_text = format!("{} {}", posting.job_type, posting.job_title);

    if any_keyword_in_text(&employment_text, &role.employment_exclude) {
        return false;
    }

    if !role.employment_include.is_empty()
        && !any_keyword_in_text(&employment_text, &role.employment_include)
    {
        return false;
    }

    true
}

/// Filter postings by the role configuration. Order is preserved and the
/// input is left untouched.
pub fn filter_postings(postings: &[JobPosting], role: &RoleFilterConfig) -> Vec<JobPosting> {
    postings
        .iter()
        .filter(|p| matches_role(p, role))
        .cloned()
        .collect()
}

// ============================================
// Location Pass
// ============================================

/// Drop postings whose location does not mention any of the source's
/// `location_include_any_of` keywords. Postings without a location are
/// dropped too when the source declares a location list.
pub fn filter_by_location(postings: Vec<JobPosting>, source: &SourceConfig) -> Vec<JobPosting> {
    let include = &source.location_include_any_of;
    if include.is_empty() {
        return postings;
    }

    postings
        .into_iter()
        .filter(|p| match p.location.as_deref() {
            Some(location) if !location.trim().is_empty() => any_keyword_in_text(location, include),
            _ => false,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlatformType;
    use chrono::NaiveDate;

    fn posting(url: &str, title: &str, job_type: &str, location: Option<&str>) -> JobPosting {
        JobPosting {
            hospital: "X".to_string(),
            job_title: title.to_string(),
            location: location.map(|s| s.to_string()),
            url: url.to_string(),
            date_posted: None,
            job_type: job_type.to_string(),
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> Vec<JobPosting> {
        let mut first = posting(
            "https://example.com/1",
            "Registered Nurse – Operating Room (Surgical Suite)",
            "Full-Time Permanent",
            Some("Oshawa, ON"),
        );
        first.date_posted = NaiveDate::from_ymd_opt(2025, 12, 20);
        vec![
            first,
            posting("https://example.com/2", "Registered Nurse – Pediatrics", "Full-Time Permanent", Some("Oshawa, ON")),
            // job type hard-coded by the scraper, the title tells the truth
            posting("https://example.com/3", "Registered Nurse – Operating Room - Part Time", "Full-Time Permanent", Some("Oshawa, ON")),
            posting("https://example.com/4", "Perioperative RN", "Full-time", Some("Oshawa, ON")),
        ]
    }

    fn role(mode: TitleGroupsMode) -> RoleFilterConfig {
        RoleFilterConfig {
            title_groups: vec![
                strings(&["Registered Nurse", "RN"]),
                strings(&["Operating Room", "Surgical", "Perioperative"]),
            ],
            title_groups_mode: mode,
            title_exclude: strings(&["Anesthesia Assistant"]),
            employment_include: strings(&["Full-Time", "Permanent"]),
            employment_exclude: strings(&["Part-Time", "Part Time"]),
        }
    }

    fn urls(postings: &[JobPosting]) -> Vec<&str> {
        postings.iter().map(|p| p.url.as_str()).collect()
    }

    #[test]
    fn test_any_mode_keeps_single_group_matches() {
        let matched = filter_postings(&sample(), &role(TitleGroupsMode::Any));
        assert_eq!(urls(&matched), vec!["https://example.com/1", "https://example.com/2", "https://example.com/4"]);
    }

    #[test]
    fn test_all_mode_requires_every_group() {
        let matched = filter_postings(&sample(), &role(TitleGroupsMode::All));
        assert_eq!(urls(&matched), vec!["https://example.com/1", "https://example.com/4"]);
    }

    #[test]
    fn test_empty_config_passthrough() {
        let input = sample();
        let matched = filter_postings(&input, &RoleFilterConfig::default());
        assert_eq!(matched, input);
    }

    #[test]
    fn test_title_exclusion_wins() {
        let mut cfg = RoleFilterConfig::default();
        cfg.title_groups = vec![strings(&["Nurse"])];
        cfg.title_exclude = strings(&["Pediatrics"]);
        let matched = filter_postings(&sample(), &cfg);
        assert!(!urls(&matched).contains(&"https://example.com/2"));
    }

    #[test]
    fn test_employment_probe_includes_title() {
        let mut cfg = RoleFilterConfig::default();
        cfg.employment_include = strings(&["Casual"]);
        let postings = vec![posting("u", "RN - Casual", "Full-Time Permanent", None)];
        assert_eq!(filter_postings(&postings, &cfg).len(), 1);
    }

    #[test]
    fn test_group_semantics() {
        let groups = vec![strings(&["RN", "Registered Nurse"]), strings(&["OR", "Operating Room"])];
        assert!(title_groups_match("RN - OR", &groups, TitleGroupsMode::All));
        assert!(!title_groups_match("RN - ICU", &groups, TitleGroupsMode::All));
        assert!(title_groups_match("RN - ICU", &groups, TitleGroupsMode::Any));
        assert!(!title_groups_match("Partition Clerk", &groups, TitleGroupsMode::Any));
        assert!(title_groups_match("anything", &[], TitleGroupsMode::All));
    }

    #[test]
    fn test_empty_groups_are_ignored() {
        assert!(title_groups_match("Registered Nurse - OR", &[vec![]], TitleGroupsMode::All));
        assert!(title_groups_match("Registered Nurse - OR", &[vec![]], TitleGroupsMode::Any));

        let groups = vec![strings(&["Registered Nurse"]), vec![]];
        assert!(title_groups_match("Registered Nurse - OR", &groups, TitleGroupsMode::All));
        assert!(!title_groups_match("Clerk", &groups, TitleGroupsMode::All));
        assert!(!title_groups_match("Clerk", &groups, TitleGroupsMode::Any));
    }

    #[test]
    fn test_location_pass() {
        let source = SourceConfig {
            hospital: "X".to_string(),
            platform: PlatformType::Erecruit,
            url: "https://example.com".to_string(),
            location_include_any_of: strings(&["Oshawa", "Ajax"]),
        };
        let postings = vec![
            posting("1", "RN", "FT", Some("Oshawa General")),
            posting("2", "RN", "FT", Some("Whitby")),
            posting("3", "RN", "FT", None),
            posting("4", "RN", "FT", Some("Ajax-Pickering")),
        ];
        assert_eq!(urls(&filter_by_location(postings.clone(), &source)), vec!["1", "4"]);

        let open = SourceConfig { location_include_any_of: vec![], ..source };
        assert_eq!(filter_by_location(postings.clone(), &open), postings);
    }
}
