// ============================================
// Candidate Generator
// ============================================
//
// Fixed project catalog keyed by requested category. The active variant's
// `algorithm_type` selects which strategy turns the catalog into candidates.

use super::profile_analyzer::ProfileAnalysis;
use crate::models::{
    AlgorithmType, BudgetRange, CostRange, Priority, ProjectCategory, ProjectRecommendation,
};
use tracing::debug;
use uuid::Uuid;

/// Static catalog row
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub category: ProjectCategory,
    pub slug: &'static str,
    pub project_type: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub base_confidence: u32,
    pub reasoning: &'static [&'static str],
    pub cost_min: f64,
    pub cost_max: f64,
    pub timeline: &'static str,
    pub priority: Priority,
    pub tags: &'static [&'static str],
}

impl CatalogEntry {
    pub fn to_candidate(&self) -> ProjectRecommendation {
        ProjectRecommendation {
            id: format!("{}-{}", self.slug, Uuid::new_v4().simple()),
            project_type: self.project_type.to_string(),
            title: self.title.to_string(),
            description: self.description.to_string(),
            confidence: self.base_confidence,
            reasoning: self.reasoning.iter().map(|r| r.to_string()).collect(),
            estimated_cost: CostRange::usd(self.cost_min, self.cost_max),
            timeline: self.timeline.to_string(),
            priority: self.priority,
            veteran_benefits: None,
            tags: self.tags.iter().map(|t| t.to_string()).collect(),
        }
    }
}

pub const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        category: ProjectCategory::Residential,
        slug: "kitchen",
        project_type: "kitchen",
        title: "Kitchen Remodel",
        description: "Full kitchen remodel with new cabinetry, counters, lighting and premium finishes.",
        base_confidence: 85,
        reasoning: &[
            "High return on investment (75-85%)",
            "Most requested project type in the region",
            "Fits common budget ranges",
        ],
        cost_min: 25_000.0,
        cost_max: 75_000.0,
        timeline: "4-8 weeks",
        priority: Priority::High,
        tags: &["high-roi", "popular", "value-add", "kitchen"],
    },
    CatalogEntry {
        category: ProjectCategory::Residential,
        slug: "bathroom",
        project_type: "bathroom",
        title: "Bathroom Renovation",
        description: "Bathroom renovation with accessibility options and water-efficient fixtures.",
        base_confidence: 78,
        reasoning: &[
            "Solid return on investment (60-70%)",
            "Accessibility improvements available",
            "Lower water and energy use",
        ],
        cost_min: 15_000.0,
        cost_max: 45_000.0,
        timeline: "3-6 weeks",
        priority: Priority::Medium,
        tags: &["roi", "accessibility", "efficiency", "bathroom"],
    },
    CatalogEntry {
        category: ProjectCategory::Commercial,
        slug: "office",
        project_type: "commercial",
        title: "Office Build-Out",
        description: "Commercial office renovation focused on layout efficiency and a professional finish.",
        base_confidence: 72,
        reasoning: &[
            "Improves team productivity",
            "Professional client-facing space",
            "Future-ready workspace layout",
        ],
        cost_min: 50_000.0,
        cost_max: 150_000.0,
        timeline: "6-12 weeks",
        priority: Priority::Medium,
        tags: &["commercial", "productivity", "professional", "office"],
    },
    CatalogEntry {
        category: ProjectCategory::Renovation,
        slug: "whole-home",
        project_type: "renovation",
        title: "Whole-Home Renovation",
        description: "Comprehensive renovation covering systems, envelope and interior finishes.",
        base_confidence: 80,
        reasoning: &[
            "Largest home value increase",
            "Upgrades mechanical and electrical systems",
            "Long-term investment",
        ],
        cost_min: 100_000.0,
        cost_max: 300_000.0,
        timeline: "12-24 weeks",
        priority: Priority::High,
        tags: &["comprehensive", "value", "systems", "renovation"],
    },
    CatalogEntry {
        category: ProjectCategory::Addition,
        slug: "addition",
        project_type: "addition",
        title: "Room Addition",
        description: "New living space designed to match the existing home.",
        base_confidence: 75,
        reasoning: &[
            "Adds usable square footage",
            "Increases home value",
            "Room for a growing household",
        ],
        cost_min: 75_000.0,
        cost_max: 200_000.0,
        timeline: "8-16 weeks",
        priority: Priority::Medium,
        tags: &["expansion", "space", "value", "addition"],
    },
];

pub fn catalog_for(category: ProjectCategory) -> impl Iterator<Item = &'static CatalogEntry> {
    CATALOG.iter().filter(move |entry| entry.category == category)
}

/// Generation strategy selected by a variant's algorithm type
pub trait CandidateStrategy: Send + Sync {
    fn generate(&self, analysis: &ProfileAnalysis, budget: &BudgetRange)
        -> Vec<ProjectRecommendation>;

    fn algorithm(&self) -> AlgorithmType;
}

/// Every catalog entry of every requested category
pub struct StandardStrategy;

impl CandidateStrategy for StandardStrategy {
    fn generate(
        &self,
        analysis: &ProfileAnalysis,
        _budget: &BudgetRange,
    ) -> Vec<ProjectRecommendation> {
        analysis
            .project_interests
            .iter()
            .flat_map(|category| catalog_for(*category))
            .map(CatalogEntry::to_candidate)
            .collect()
    }

    fn algorithm(&self) -> AlgorithmType {
        AlgorithmType::Standard
    }
}

/// Standard candidates whose cost range overlaps the visitor budget.
/// Falls back to the unfiltered set when nothing overlaps.
pub struct BudgetAwareStrategy;

impl CandidateStrategy for BudgetAwareStrategy {
    fn generate(
        &self,
        analysis: &ProfileAnalysis,
        budget: &BudgetRange,
    ) -> Vec<ProjectRecommendation> {
        let all = StandardStrategy.generate(analysis, budget);
        let affordable: Vec<ProjectRecommendation> = all
            .iter()
            .filter(|c| c.estimated_cost.overlaps(budget))
            .cloned()
            .collect();

        if affordable.is_empty() {
            all
        } else {
            affordable
        }
    }

    fn algorithm(&self) -> AlgorithmType {
        AlgorithmType::BudgetAware
    }
}

pub struct CandidateGenerator {
    strategies: Vec<Box<dyn CandidateStrategy>>,
}

impl Default for CandidateGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateGenerator {
    pub fn new() -> Self {
        Self {
            strategies: vec![Box::new(StandardStrategy), Box::new(BudgetAwareStrategy)],
        }
    }

    pub fn generate(
        &self,
        analysis: &ProfileAnalysis,
        budget: &BudgetRange,
        algorithm: AlgorithmType,
    ) -> Vec<ProjectRecommendation> {
        let strategy = self
            .strategies
            .iter()
            .find(|s| s.algorithm() == algorithm)
            .unwrap_or(&self.strategies[0]);

        let candidates = strategy.generate(analysis, budget);
        debug!(
            algorithm = ?strategy.algorithm(),
            candidate_count = candidates.len(),
            "Candidates generated"
        );
        candidates
    }
}
