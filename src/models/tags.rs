use serde::Deserialize;
use serde::Serialize;

/// Ordered list of distinct tags
///
/// A `null` column deserializes to an empty list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, derive_more::Deref)]
#[serde(from = "Option<Vec<String>>", into = "Vec<String>")]
pub struct Tags(Vec<String>);

impl Tags {
    /// Keeps the first occurrence of each tag
    pub fn new(value: Vec<String>) -> Self {
        let mut tags: Vec<String> = Vec::with_capacity(value.len());
        for tag in value {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        Self(tags)
    }

    /// Parses the comma separated input of the admin form
    ///
    /// Entries are trimmed and empty entries are dropped.
    pub fn parse(input: &str) -> Self {
        Self::new(
            input
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    /// Renders the tags back into the admin form input
    pub fn to_input(&self) -> String {
        self.0.join(", ")
    }

    /// How many of our tags also appear in `other` (exact, case-sensitive)
    pub fn shared_with(&self, other: &Tags) -> usize {
        self.0.iter().filter(|tag| other.0.contains(tag)).count()
    }
}

impl From<Option<Vec<String>>> for Tags {
    fn from(value: Option<Vec<String>>) -> Self {
        Self::new(value.unwrap_or_default())
    }
}

impl From<Tags> for Vec<String> {
    fn from(value: Tags) -> Self {
        value.0
    }
}

impl<S: Into<String>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::Tags;

    #[rstest]
    #[case::simple("ai, automation", &["ai", "automation"])]
    #[case::empty_entries(" ai ,, ,automation,", &["ai", "automation"])]
    #[case::blank("   ", &[])]
    #[case::duplicates("ai, AI, ai", &["ai", "AI"])]
    #[case::inner_spaces("voice ai, real estate", &["voice ai", "real estate"])]
    fn parse_form_input(#[case] input: &str, #[case] expected: &[&str]) {
        assert_eq!(Tags::parse(input).as_slice(), expected);
    }

    #[test]
    fn input_round_trip_is_stable() {
        let tags = Tags::parse("ai,  automation ,voice");
        assert_eq!(tags.to_input(), "ai, automation, voice");
        assert_eq!(Tags::parse(&tags.to_input()), tags);
    }

    #[test]
    fn shared_tags_are_case_sensitive() {
        let current: Tags = ["AI", "SaaS", "Voice"].into_iter().collect();
        let candidate: Tags = ["ai", "SaaS", "Voice", "Other"].into_iter().collect();
        assert_eq!(current.shared_with(&candidate), 2);
    }

    #[test]
    fn null_column_is_an_empty_list() {
        let tags: Tags = serde_json::from_str("null").unwrap();
        assert!(tags.is_empty());
        let tags: Tags = serde_json::from_str(r#"["a", "b", "a"]"#).unwrap();
        assert_eq!(tags.as_slice(), ["a", "b"]);
    }
}
