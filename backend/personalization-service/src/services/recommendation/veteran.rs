// ============================================
// Veteran Enhancer
// ============================================

use crate::models::{BenefitType, ProjectRecommendation, VeteranBenefit, VeteranProfile};

/// Confidence bonus applied to every candidate for veteran visitors
pub const VETERAN_CONFIDENCE_BONUS: u32 = 5;

/// Base veteran discount (percent)
pub const BASE_DISCOUNT_PERCENT: u32 = 10;

/// Extra discount for combat veterans (percent, on top of the base)
pub const COMBAT_DISCOUNT_PERCENT: u32 = 2;

/// Attach benefits and the confidence bonus to every candidate.
pub fn enhance_for_veterans(
    candidates: Vec<ProjectRecommendation>,
    details: &VeteranProfile,
) -> Vec<ProjectRecommendation> {
    candidates
        .into_iter()
        .map(|mut candidate| {
            candidate.veteran_benefits = Some(veteran_benefits(details));
            candidate.confidence = candidate
                .confidence
                .saturating_add(VETERAN_CONFIDENCE_BONUS);
            candidate
                .reasoning
                .push("Includes veteran benefits and priority service".to_string());
            candidate
        })
        .collect()
}

/// Ordered benefit list: base discount, combat discount, priority service,
/// branch specialist, accessibility financing.
pub fn veteran_benefits(details: &VeteranProfile) -> Vec<VeteranBenefit> {
    let mut benefits = vec![base_discount()];

    if details.combat_veteran {
        benefits.push(VeteranBenefit {
            benefit_type: BenefitType::Discount,
            title: "Combat Veteran Discount".to_string(),
            description: "Additional discount for combat veterans".to_string(),
            value: format!(
                "Additional {}% off ({}% total)",
                COMBAT_DISCOUNT_PERCENT,
                BASE_DISCOUNT_PERCENT + COMBAT_DISCOUNT_PERCENT
            ),
        });
    }

    benefits.push(VeteranBenefit {
        benefit_type: BenefitType::Priority,
        title: "Veteran Priority Service".to_string(),
        description: "Expedited scheduling and a dedicated project manager".to_string(),
        value: "Priority scheduling and response".to_string(),
    });

    let branch = details.service_branch.trim();
    benefits.push(VeteranBenefit {
        benefit_type: BenefitType::Specialist,
        title: if branch.is_empty() {
            "Veteran Specialist".to_string()
        } else {
            format!("{} Veteran Specialist", branch)
        },
        description: "Project specialist who is a veteran team member".to_string(),
        value: details
            .preferred_specialist
            .clone()
            .unwrap_or_else(|| "Dedicated veteran project specialist".to_string()),
    });

    if details.disability_rating.map_or(false, |r| r > 0) {
        benefits.push(VeteranBenefit {
            benefit_type: BenefitType::Financing,
            title: "Accessibility Enhancement Program".to_string(),
            description: "Financing and grant coordination for accessibility work".to_string(),
            value: "VA benefit coordination and special financing".to_string(),
        });
    }

    benefits
}

pub fn base_discount() -> VeteranBenefit {
    VeteranBenefit {
        benefit_type: BenefitType::Discount,
        title: "Veteran Appreciation Discount".to_string(),
        description: "Automatic discount for military service members".to_string(),
        value: format!("{}% off total project cost", BASE_DISCOUNT_PERCENT),
    }
}
