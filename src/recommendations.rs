use crate::analysis::Category;

/// One actionable follow-up shown on the result view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecommendationItem {
    pub title: &'static str,
    pub description: &'static str,
    pub action_label: &'static str,
    pub priority: bool,
}

impl RecommendationItem {
    const fn new(title: &'static str, description: &'static str, action_label: &'static str) -> Self {
        Self {
            title,
            description,
            action_label,
            priority: false,
        }
    }

    const fn priority(mut self) -> Self {
        self.priority = true;
        self
    }
}

/// Map a classification to its ordered follow-up list.
///
/// Content is fixed per category; the renderer shows items in this order.
/// Murmur and noisy each lead with exactly one priority item, normal has
/// none.
pub fn recommendations_for(category: Category) -> Vec<RecommendationItem> {
    match category {
        Category::Normal => vec![
            RecommendationItem::new(
                "Maintain Healthy Diet",
                "Continue eating heart-healthy foods rich in omega-3, fiber, and antioxidants",
                "Learn about heart-healthy recipes",
            ),
            RecommendationItem::new(
                "Regular Exercise",
                "Keep up with 150 minutes of moderate aerobic activity per week",
                "Get a personalized workout plan",
            ),
            RecommendationItem::new(
                "Regular Check-ups",
                "Schedule annual heart health screenings with your doctor",
                "Find healthcare providers",
            ),
        ],
        Category::Murmur => vec![
            RecommendationItem::new(
                "Consult a Doctor",
                "Schedule an appointment with a cardiologist for professional evaluation",
                "Find cardiologists near you",
            )
            .priority(),
            RecommendationItem::new(
                "Monitor Symptoms",
                "Keep track of any chest pain, shortness of breath, or fatigue",
                "Download symptom tracker",
            ),
            RecommendationItem::new(
                "Heart-Healthy Lifestyle",
                "Adopt a low-sodium diet and avoid excessive caffeine",
                "Get dietary recommendations",
            ),
        ],
        Category::Noisy => vec![
            RecommendationItem::new(
                "Re-record Audio",
                "Try recording in a quieter environment with better microphone placement",
                "Upload new recording",
            )
            .priority(),
            RecommendationItem::new(
                "Optimal Recording Time",
                "Record for 10-30 seconds when you are calm and relaxed",
                "View recording tips",
            ),
        ],
    }
}
