use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Personal profile used to tailor the analysis. Every field is optional;
/// absent values fall back to the defaults in [`UserProfile::render_fields`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    // Kept as JSON numbers so `72.0` renders as written instead of `72`
    pub weight: Option<Number>, // kg
    #[serde(default)]
    pub height: Option<Number>, // cm
    #[serde(default)]
    pub health_conditions: Option<String>,
    #[serde(default)]
    pub dietary_preference: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default)]
    pub health_goals: Option<String>,
    #[serde(default)]
    pub activity_level: Option<String>,
}

const NOT_SPECIFIED: &str = "Not specified";

impl UserProfile {
    /// Placeholder values for this profile, defaults applied.
    pub fn render_fields(&self) -> Vec<(&'static str, String)> {
        fn or_default<T: ToString>(value: &Option<T>, default: &str) -> String {
            value
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| default.to_string())
        }

        vec![
            ("age", or_default(&self.age, NOT_SPECIFIED)),
            ("gender", or_default(&self.gender, NOT_SPECIFIED)),
            ("weight", or_default(&self.weight, NOT_SPECIFIED)),
            ("height", or_default(&self.height, NOT_SPECIFIED)),
            ("health_conditions", or_default(&self.health_conditions, "None")),
            (
                "dietary_preference",
                or_default(&self.dietary_preference, "No specific preference"),
            ),
            ("allergies", or_default(&self.allergies, "None")),
            ("health_goals", or_default(&self.health_goals, "maintain health")),
            ("activity_level", or_default(&self.activity_level, "moderate")),
        ]
    }
}

/// Product data as returned by a barcode/food database lookup.
///
/// The nested sections are free-form and passed through to the prompt
/// untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoodRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub serving: Map<String, Value>,
    #[serde(default)]
    pub nutrition: Map<String, Value>,
    #[serde(default)]
    pub nutrition_scores: Map<String, Value>,
    #[serde(default)]
    pub dietary_info: Map<String, Value>,
    #[serde(default)]
    pub environmental_impact: Map<String, Value>,
}

impl FoodRecord {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }

    /// Placeholder values for this record. Nested sections render as compact JSON.
    pub fn render_fields(&self) -> Vec<(&'static str, String)> {
        let section = |map: &Map<String, Value>| Value::Object(map.clone()).to_string();

        vec![
            ("name", self.display_name().to_string()),
            ("brand", self.brand.clone().unwrap_or_else(|| "Unknown".to_string())),
            ("serving", section(&self.serving)),
            ("nutrition", section(&self.nutrition)),
            ("nutrition_scores", section(&self.nutrition_scores)),
            ("dietary_info", section(&self.dietary_info)),
            ("environmental_impact", section(&self.environmental_impact)),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    Simple,
    Detailed,
}

impl AnalysisKind {
    pub fn template_name(&self) -> &'static str {
        match self {
            AnalysisKind::Simple => "simple",
            AnalysisKind::Detailed => "detailed",
        }
    }

    /// Output cap sent to the model.
    pub fn max_tokens(&self) -> u32 {
        match self {
            AnalysisKind::Simple => 300,
            AnalysisKind::Detailed => 400,
        }
    }

    pub fn all() -> [AnalysisKind; 2] {
        [AnalysisKind::Simple, AnalysisKind::Detailed]
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Some(AnalysisKind::Simple),
            "detailed" => Some(AnalysisKind::Detailed),
            _ => None,
        }
    }
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.template_name())
    }
}

impl std::str::FromStr for AnalysisKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnalysisKind::from_string(s)
            .ok_or_else(|| format!("unknown analysis kind '{}' (expected simple or detailed)", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field<'a>(fields: &'a [(&'static str, String)], name: &str) -> &'a str {
        fields
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
            .unwrap()
    }

    #[test]
    fn test_user_defaults() {
        let fields = UserProfile::default().render_fields();

        assert_eq!(field(&fields, "age"), "Not specified");
        assert_eq!(field(&fields, "gender"), "Not specified");
        assert_eq!(field(&fields, "weight"), "Not specified");
        assert_eq!(field(&fields, "height"), "Not specified");
        assert_eq!(field(&fields, "health_conditions"), "None");
        assert_eq!(field(&fields, "dietary_preference"), "No specific preference");
        assert_eq!(field(&fields, "allergies"), "None");
        assert_eq!(field(&fields, "health_goals"), "maintain health");
        assert_eq!(field(&fields, "activity_level"), "moderate");
    }

    #[test]
    fn test_user_from_partial_json() {
        let json = r#"{"age": 34, "weight": 72.5, "allergies": null, "favourite_color": "blue"}"#;
        let user: UserProfile = serde_json::from_str(json).unwrap();
        let fields = user.render_fields();

        assert_eq!(field(&fields, "age"), "34");
        assert_eq!(field(&fields, "weight"), "72.5");
        assert_eq!(field(&fields, "allergies"), "None");
    }

    #[test]
    fn test_measurements_render_as_written() {
        let user: UserProfile = serde_json::from_str(r#"{"weight": 72.0, "height": 180}"#).unwrap();
        let fields = user.render_fields();

        assert_eq!(field(&fields, "weight"), "72.0");
        assert_eq!(field(&fields, "height"), "180");
    }

    #[test]
    fn test_food_sections_render_as_json() {
        let json = r#"{
            "name": "Greek Yogurt",
            "nutrition": {"protein_g": 10}
        }"#;
        let food: FoodRecord = serde_json::from_str(json).unwrap();
        let fields = food.render_fields();

        assert_eq!(field(&fields, "name"), "Greek Yogurt");
        assert_eq!(field(&fields, "brand"), "Unknown");
        assert_eq!(field(&fields, "nutrition"), r#"{"protein_g":10}"#);
        assert_eq!(field(&fields, "serving"), "{}");
    }

    #[test]
    fn test_analysis_kind_limits() {
        assert_eq!(AnalysisKind::Simple.max_tokens(), 300);
        assert_eq!(AnalysisKind::Detailed.max_tokens(), 400);
        assert_eq!(AnalysisKind::from_string(" Detailed "), Some(AnalysisKind::Detailed));
        assert!("weekly".parse::<AnalysisKind>().is_err());
    }
}
