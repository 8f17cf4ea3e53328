use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::models::VehicleAssessment;

const DISCLAIMER: &str = "This report was generated by AI-assisted image analysis and is provided \
for informational purposes only. Actual repair costs may vary. Please consult a certified \
auto body professional or your insurance adjuster for an official assessment.";

/// A rendered plain-text damage report, ready to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub file_name: String,
    pub contents: String,
}

impl Report {
    pub fn render(assessment: &VehicleAssessment, generated_at: DateTime<Local>) -> Self {
        let contents = format!(
            "CLAIMCOMPASS - VEHICLE DAMAGE ASSESSMENT REPORT\n\
             ===============================================\n\
             Generated: {generated}\n\
             \n\
             VEHICLE INFORMATION\n\
             -------------------\n\
             Make: {make}\n\
             Model: {model}\n\
             Color: {color}\n\
             \n\
             DAMAGE SUMMARY\n\
             --------------\n\
             {damage}\n\
             \n\
             REPAIR COST ESTIMATE\n\
             --------------------\n\
             {cost}\n\
             \n\
             DISCLAIMER\n\
             ----------\n\
             {DISCLAIMER}\n",
            generated = generated_at.format("%Y-%m-%d %H:%M:%S"),
            make = assessment.make,
            model = assessment.model,
            color = assessment.color,
            damage = assessment.damage_summary,
            cost = assessment.repair_cost_estimate,
        );

        Self {
            file_name: format!(
                "car-damage-report-{}.txt",
                generated_at.format("%Y-%m-%d-%H%M%S")
            ),
            contents,
        }
    }

    /// Writes the report into `dir` and returns the full path.
    pub fn save_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.contents)?;
        Ok(path)
    }
}
