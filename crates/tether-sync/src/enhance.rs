//! Context enhancement.
//!
//! Turns the entities returned by the memory store into ranked sections:
//! what worked before (grouped into the technical profile and a "Proven
//! Solutions" list) and what went wrong ("Known Issues"). The store's own
//! sections are kept after these, deduplicated by title.
//!
//! Classification is declarative: each class is a [`Rule`] over entity
//! properties, evaluated independently.

use std::collections::BTreeMap;

use tether_types::{Entity, MemoryContextResponse, Section};

pub const TECHNICAL_PROFILE: &str = "Technical Profile";
pub const PROVEN_SOLUTIONS: &str = "Proven Solutions";
pub const KNOWN_ISSUES: &str = "Known Issues";

/// Category used when an entity has neither `category` nor `language`.
pub const DEFAULT_CATEGORY: &str = "Other";

/// Names listed per guidance block.
const GUIDANCE_LIMIT: usize = 3;

/// A predicate over entity properties. String comparisons ignore ASCII case.
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// Property equals the value.
    Is(&'static str, &'static str),
    /// Property is missing, null or blank.
    Absent(&'static str),
    /// Property equals one of the values.
    OneOf(&'static str, &'static [&'static str]),
    All(&'static [Rule]),
    Any(&'static [Rule]),
}

impl Rule {
    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            Rule::Is(key, value) => entity.property_is(key, value),
            Rule::Absent(key) => entity.property(key).is_none(),
            Rule::OneOf(key, values) => values.iter().any(|v| entity.property_is(key, v)),
            Rule::All(rules) => rules.iter().all(|r| r.matches(entity)),
            Rule::Any(rules) => rules.iter().any(|r| r.matches(entity)),
        }
    }
}

/// Succeeded, and tests passed or were not run.
pub const SUCCESSFUL: Rule = Rule::All(&[
    Rule::Is("status", "success"),
    Rule::Any(&[Rule::Is("test_status", "passed"), Rule::Absent("test_status")]),
]);

/// Failed, regressed, or broke tests.
pub const PROBLEMATIC: Rule = Rule::Any(&[
    Rule::Is("status", "failed"),
    Rule::Is("outcome", "regression"),
    Rule::Is("test_status", "failed"),
]);

/// Successful work that shipped a fix or improvement.
pub const EFFECTIVE_SOLUTION: Rule = Rule::All(&[
    SUCCESSFUL,
    Rule::OneOf("outcome", &["implemented", "bug_fixed", "optimized"]),
]);

/// Entities sorted into classes. One entity may land in several.
#[derive(Debug, Clone, Default)]
pub struct Classification<'a> {
    pub successful: Vec<&'a Entity>,
    pub problematic: Vec<&'a Entity>,
    pub effective: Vec<&'a Entity>,
}

impl<'a> Classification<'a> {
    pub fn classify(entities: &'a [Entity]) -> Self {
        let mut classes = Self::default();
        for entity in entities {
            if SUCCESSFUL.matches(entity) {
                classes.successful.push(entity);
            }
            if PROBLEMATIC.matches(entity) {
                classes.problematic.push(entity);
            }
            if EFFECTIVE_SOLUTION.matches(entity) {
                classes.effective.push(entity);
            }
        }
        classes
    }

    /// Guidance text naming a few entities from each non-empty class.
    pub fn guidance(&self) -> String {
        let mut blocks = Vec::new();
        if !self.effective.is_empty() {
            blocks.push(guidance_block(
                "Recommendations",
                "Build on approaches that worked before:",
                &self.effective,
            ));
        }
        if !self.problematic.is_empty() {
            blocks.push(guidance_block(
                "Warnings",
                "Avoid repeating what failed before:",
                &self.problematic,
            ));
        }
        blocks.join("\n")
    }
}

fn guidance_block(title: &str, lead: &str, entities: &[&Entity]) -> String {
    let mut block = format!("**{}**: {}\n", title, lead);
    for entity in entities.iter().take(GUIDANCE_LIMIT) {
        block.push_str("- ");
        block.push_str(&entity.display_name());
        block.push('\n');
    }
    block
}

/// Sections and guidance ready for rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnhancedContext {
    pub sections: Vec<Section>,
    pub guidance: String,
}

impl EnhancedContext {
    /// Classify the response's entities and rebuild its section list.
    pub fn from_response(response: &MemoryContextResponse) -> Self {
        let classes = Classification::classify(&response.entities);
        Self {
            sections: build_sections(&response.sections, &classes),
            guidance: classes.guidance(),
        }
    }
}

/// Rebuild the section list.
///
/// Order: technical profile (reused case-insensitively if the store sent
/// one), proven solutions, known issues, then every other incoming section
/// in its original order. Titles are unique in the output; a later section
/// with a title already emitted is merged into the earlier one.
pub fn build_sections(original: &[Section], classes: &Classification<'_>) -> Vec<Section> {
    let profile_index = original.iter().position(|s| s.has_title(TECHNICAL_PROFILE));
    let mut profile = profile_index
        .map(|i| original[i].clone())
        .unwrap_or_else(|| Section::new(TECHNICAL_PROFILE));
    for (category, values) in group_by_category(&classes.successful) {
        append_values(&mut profile, category, values);
    }

    let mut out: Vec<Section> = Vec::new();
    if profile_index.is_some() || !profile.items.is_empty() {
        out.push(profile);
    }
    if !classes.effective.is_empty() {
        out.push(grouped_section(PROVEN_SOLUTIONS, &classes.effective));
    }
    if !classes.problematic.is_empty() {
        out.push(grouped_section(KNOWN_ISSUES, &classes.problematic));
    }

    for (index, section) in original.iter().enumerate() {
        if Some(index) != profile_index {
            merge_into(&mut out, section);
        }
    }
    out
}

/// Append a section, or its items to an emitted section with the same title.
fn merge_into(out: &mut Vec<Section>, section: &Section) {
    match out.iter_mut().find(|s| s.has_title(&section.title)) {
        Some(existing) => existing.items.extend(section.items.iter().cloned()),
        None => out.push(section.clone()),
    }
}

fn grouped_section(title: &str, entities: &[&Entity]) -> Section {
    let mut section = Section::new(title);
    for (category, values) in group_by_category(entities) {
        append_values(&mut section, category, values);
    }
    section
}

fn append_values(section: &mut Section, label: String, values: Vec<String>) {
    match section
        .items
        .iter_mut()
        .find(|item| item.label.eq_ignore_ascii_case(&label))
    {
        Some(item) => item.values.extend(values),
        None => section.push(label, values),
    }
}

/// Group formatted entities by category, categories in sorted order.
fn group_by_category(entities: &[&Entity]) -> BTreeMap<String, Vec<String>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for entity in entities {
        groups
            .entry(category_of(entity))
            .or_default()
            .push(format_entity(entity));
    }
    groups
}

/// `category`, else `language`, else [`DEFAULT_CATEGORY`].
pub fn category_of(entity: &Entity) -> String {
    entity
        .property("category")
        .or_else(|| entity.property("language"))
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
}

/// Render an entity as a one-line item.
///
/// `name [status] (status: .., outcome: .., test_status: .., path: .., language: .., conf=0.NN)`
/// with absent fields left out, and the parentheses dropped when empty.
pub fn format_entity(entity: &Entity) -> String {
    let mut line = entity.display_name();
    if let Some(status) = entity.status() {
        line.push_str(&format!(" [{}]", status));
    }

    let mut fields: Vec<String> = ["status", "outcome", "test_status", "path", "language"]
        .iter()
        .filter_map(|key| entity.property(key).map(|v| format!("{}: {}", key, v)))
        .collect();
    if let Some(confidence) = entity.confidence {
        fields.push(format!("conf={:.2}", confidence));
    }

    if !fields.is_empty() {
        line.push_str(&format!(" ({})", fields.join(", ")));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_types::ContextStats;

    fn entity(name: &str, props: &[(&str, &str)]) -> Entity {
        props
            .iter()
            .fold(Entity::new(name), |e, (k, v)| e.with_property(*k, *v))
    }

    fn titles(sections: &[Section]) -> Vec<&str> {
        sections.iter().map(|s| s.title.as_str()).collect()
    }

    fn all_values(section: &Section) -> Vec<&str> {
        section
            .items
            .iter()
            .flat_map(|i| i.values.iter().map(String::as_str))
            .collect()
    }

    #[test]
    fn test_predicates() {
        let passed = entity("a", &[("status", "success"), ("test_status", "passed")]);
        let untested = entity("b", &[("status", "SUCCESS")]);
        let broke_tests = entity("c", &[("status", "success"), ("test_status", "failed")]);
        let regression = entity("d", &[("status", "success"), ("outcome", "regression")]);

        assert!(SUCCESSFUL.matches(&passed));
        assert!(SUCCESSFUL.matches(&untested));
        assert!(!SUCCESSFUL.matches(&broke_tests));
        assert!(PROBLEMATIC.matches(&broke_tests));
        // Regressions are both successful and problematic
        assert!(SUCCESSFUL.matches(&regression));
        assert!(PROBLEMATIC.matches(&regression));
        assert!(!EFFECTIVE_SOLUTION.matches(&regression));
    }

    #[test]
    fn test_effective_solution_requires_shipping_outcome() {
        for outcome in ["implemented", "bug_fixed", "optimized"] {
            let e = entity("x", &[("status", "success"), ("outcome", outcome)]);
            assert!(EFFECTIVE_SOLUTION.matches(&e), "{outcome}");
        }
        let e = entity("x", &[("status", "success"), ("outcome", "explored")]);
        assert!(!EFFECTIVE_SOLUTION.matches(&e));
        let e = entity("x", &[("status", "draft"), ("outcome", "bug_fixed")]);
        assert!(!EFFECTIVE_SOLUTION.matches(&e));
    }

    #[test]
    fn test_proven_solutions_and_known_issues() {
        let response = MemoryContextResponse {
            stats: ContextStats {
                memories: 2,
                ..Default::default()
            },
            entities: vec![
                entity(
                    "A",
                    &[("status", "success"), ("test_status", "passed"), ("outcome", "bug_fixed")],
                ),
                entity("B", &[("status", "failed")]),
            ],
            ..Default::default()
        };

        let enhanced = EnhancedContext::from_response(&response);
        assert_eq!(
            titles(&enhanced.sections),
            vec![TECHNICAL_PROFILE, PROVEN_SOLUTIONS, KNOWN_ISSUES]
        );

        let proven = &enhanced.sections[1];
        assert!(all_values(proven).iter().any(|v| v.starts_with("A ")));
        let issues = &enhanced.sections[2];
        assert!(all_values(issues).iter().any(|v| v.starts_with("B ")));
        assert!(!all_values(issues).iter().any(|v| v.starts_with("A ")));

        assert!(enhanced.guidance.contains("**Recommendations**"));
        assert!(enhanced.guidance.contains("- A"));
        assert!(enhanced.guidance.contains("**Warnings**"));
        assert!(enhanced.guidance.contains("- B"));
    }

    #[test]
    fn test_profile_reused_case_insensitively() {
        let mut existing = Section::new("technical profile");
        existing.push("Rust", vec!["tokio".to_string()]);
        let response = MemoryContextResponse {
            sections: vec![existing, Section::new("Recent Work")],
            entities: vec![entity("parser", &[("status", "success"), ("language", "rust")])],
            ..Default::default()
        };

        let enhanced = EnhancedContext::from_response(&response);
        assert_eq!(titles(&enhanced.sections), vec!["technical profile", "Recent Work"]);

        let profile = &enhanced.sections[0];
        // Existing label matched case-insensitively and extended
        assert_eq!(profile.items.len(), 1);
        assert_eq!(profile.items[0].values[0], "tokio");
        assert!(profile.items[0].values[1].starts_with("parser"));
    }

    #[test]
    fn test_remaining_sections_keep_order_and_dedupe() {
        let mut first = Section::new("Recent Work");
        first.push("today", vec!["a".to_string()]);
        let mut dup = Section::new("recent work");
        dup.push("yesterday", vec!["b".to_string()]);
        let mut issues = Section::new("known issues");
        issues.push("ci", vec!["flaky".to_string()]);

        let response = MemoryContextResponse {
            sections: vec![first, Section::new("Preferences"), dup, issues],
            entities: vec![entity("B", &[("status", "failed")])],
            ..Default::default()
        };

        let enhanced = EnhancedContext::from_response(&response);
        assert_eq!(
            titles(&enhanced.sections),
            vec![KNOWN_ISSUES, "Recent Work", "Preferences"]
        );
        // Nothing dropped: duplicates were merged
        assert_eq!(enhanced.sections[0].items.len(), 2);
        assert_eq!(enhanced.sections[1].items.len(), 2);
    }

    #[test]
    fn test_duplicate_profile_sections_merged() {
        let mut a = Section::new("Technical Profile");
        a.push("Go", vec!["x".to_string()]);
        let mut b = Section::new("TECHNICAL PROFILE");
        b.push("Rust", vec!["y".to_string()]);

        let response = MemoryContextResponse {
            sections: vec![a, b],
            ..Default::default()
        };
        let enhanced = EnhancedContext::from_response(&response);
        assert_eq!(titles(&enhanced.sections), vec!["Technical Profile"]);
        assert_eq!(enhanced.sections[0].items.len(), 2);
    }

    #[test]
    fn test_successful_grouped_by_category() {
        let response = MemoryContextResponse {
            entities: vec![
                entity("a", &[("status", "success"), ("category", "build")]),
                entity("b", &[("status", "success"), ("language", "python")]),
                entity("c", &[("status", "success")]),
            ],
            ..Default::default()
        };
        let enhanced = EnhancedContext::from_response(&response);
        let labels: Vec<&str> = enhanced.sections[0]
            .items
            .iter()
            .map(|i| i.label.as_str())
            .collect();
        assert_eq!(labels, vec![DEFAULT_CATEGORY, "build", "python"]);
    }

    #[test]
    fn test_guidance_limited_to_three() {
        let entities: Vec<Entity> = (0..5)
            .map(|i| entity(&format!("fix{i}"), &[("status", "success"), ("outcome", "implemented")]))
            .collect();
        let classes = Classification::classify(&entities);
        let guidance = classes.guidance();
        assert!(guidance.contains("- fix2"));
        assert!(!guidance.contains("- fix3"));
        assert!(!guidance.contains("Warnings"));
    }

    #[test]
    fn test_no_entities_no_guidance() {
        let enhanced = EnhancedContext::from_response(&MemoryContextResponse::default());
        assert!(enhanced.sections.is_empty());
        assert!(enhanced.guidance.is_empty());
    }

    #[test]
    fn test_format_entity_full() {
        let mut e = entity(
            "retry_flaky",
            &[
                ("status", "success"),
                ("outcome", "bug_fixed"),
                ("test_status", "passed"),
                ("path", "src/ci.rs"),
                ("language", "rust"),
            ],
        );
        e.entity_type = Some("function".to_string());
        e.confidence = Some(0.876);

        assert_eq!(
            format_entity(&e),
            "retry_flaky [success] (status: success, outcome: bug_fixed, test_status: passed, \
             path: src/ci.rs, language: rust, conf=0.88)"
        );
    }

    #[test]
    fn test_format_entity_omits_absent_fields() {
        assert_eq!(format_entity(&Entity::new("bare")), "bare");

        let e = entity("partial", &[("outcome", "regression"), ("path", "  ")]);
        assert_eq!(format_entity(&e), "partial (outcome: regression)");
    }

    #[test]
    fn test_entity_named_only_in_properties() {
        let response: MemoryContextResponse = serde_json::from_value(serde_json::json!({
            "entities": [{
                "properties": {"name": "A", "status": "success", "outcome": "bug_fixed"}
            }]
        }))
        .unwrap();
        let enhanced = EnhancedContext::from_response(&response);

        let proven = enhanced
            .sections
            .iter()
            .find(|s| s.title == PROVEN_SOLUTIONS)
            .unwrap();
        assert_eq!(
            proven.items[0].values,
            vec!["A [success] (status: success, outcome: bug_fixed)".to_string()]
        );
        assert!(enhanced.guidance.contains("- A\n"));
    }
}
