// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Discovery reporting: projects and candidate destinations.

use crate::output::{human_bytes, print_columns};
use anyhow::Result;
use bak_engine::{
    discover_destinations, discover_projects, recommend_destination, DiscoverOptions,
};
use bak_engine::discover::{DestinationRoots, DiskCapacityProbe};

pub fn run(projects_only: bool, destinations_only: bool) -> Result<()> {
    if !destinations_only {
        let projects = discover_projects(&DiscoverOptions::default(), None);
        if projects.is_empty() {
            println!("no projects found");
        } else {
            println!("projects:");
            let rows: Vec<(String, String)> = projects
                .iter()
                .map(|p| {
                    (
                        p.path.display().to_string(),
                        format!(
                            "{} ({})",
                            p.project_type.as_str(),
                            human_bytes(p.estimated_size_bytes)
                        ),
                    )
                })
                .collect();
            print_columns(&rows);
        }
    }

    if !projects_only {
        let destinations =
            discover_destinations(&DestinationRoots::default(), &DiskCapacityProbe);
        if destinations.is_empty() {
            println!("no candidate destinations found");
        } else {
            println!("destinations:");
            let rows: Vec<(String, String)> = destinations
                .iter()
                .map(|d| {
                    (
                        d.path.display().to_string(),
                        format!(
                            "{} score {} ({} free)",
                            d.destination_type.as_str(),
                            d.recommendation_score,
                            human_bytes(d.available_bytes)
                        ),
                    )
                })
                .collect();
            print_columns(&rows);

            if let Some((_, reason)) = recommend_destination(&destinations) {
                println!("recommended: {reason}");
            }
        }
    }

    Ok(())
}
