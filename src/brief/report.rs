use crate::brief::config::ProjectConfig;
use crate::brief::model::{ExecutiveReport, Link, TimelineBucket};
use crate::brief::rollup::Rollups;
use std::collections::BTreeSet;

/// Splits `###`-separated free text into trimmed, de-duplicated, sorted items.
pub fn split_items<'a>(sources: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    sources
        .into_iter()
        .flat_map(|text| text.split("###"))
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToOwned::to_owned)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn sorted(mut lines: Vec<String>) -> Vec<String> {
    lines.sort();
    lines.dedup();
    lines
}

pub fn project_links(project: &ProjectConfig, tracker_base: &str, wiki_base: &str) -> Vec<Link> {
    let mut links = vec![
        Link {
            label: "Master ticket".to_string(),
            href: format!("{}/browse/{}", tracker_base.trim_end_matches('/'), project.epic),
        },
        Link {
            label: "Executive summary".to_string(),
            href: format!(
                "{}/pages/viewpage.action?pageId={}",
                wiki_base.trim_end_matches('/'),
                project.page_id
            ),
        },
    ];
    if let Some(url) = project
        .architecture_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
    {
        links.push(Link {
            label: "Platform architecture".to_string(),
            href: url.to_string(),
        });
    }
    links
}

pub fn assemble(
    project: &ProjectConfig,
    rollups: Rollups,
    timeline: Vec<TimelineBucket>,
    tracker_base: &str,
    wiki_base: &str,
) -> ExecutiveReport {
    ExecutiveReport {
        page_id: project.page_id.clone(),
        name: project.name.clone(),
        description: project.goal.clone(),
        status: project.status.clone(),
        status_description: project.status_description.clone(),
        due_date: project.due_date,
        deliverables: split_items([
            project.deliverables.as_str(),
            project.success_criteria.as_str(),
        ]),
        achievements: sorted(rollups.achievements),
        focus: sorted(rollups.focus),
        next_steps: sorted(rollups.next_steps),
        risks: sorted(rollups.risks),
        prerequisites: project.prerequisites.clone(),
        raci: project.raci.clone(),
        timeline,
        links: project_links(project, tracker_base, wiki_base),
    }
}

#[cfg(test)]
mod tests {
    use super::{assemble, project_links, split_items};
    use crate::brief::config::ProjectConfig;
    use crate::brief::rollup::Rollups;
    use chrono::NaiveDate;

    fn project() -> ProjectConfig {
        ProjectConfig {
            name: "Apollo".to_string(),
            page_id: "4242".to_string(),
            epic: "APO-1".to_string(),
            jql: Some("project = APO".to_string()),
            filter_id: None,
            goal: "Launch the billing platform".to_string(),
            deliverables: "API ### UI###".to_string(),
            success_criteria: "UI###99% uptime".to_string(),
            due_date: NaiveDate::from_ymd_opt(2025, 12, 31).expect("date"),
            status: "green".to_string(),
            status_description: "On track".to_string(),
            architecture_url: None,
            prerequisites: vec![],
            raci: vec![],
        }
    }

    #[test]
    fn split_items_drops_empties_and_duplicates() {
        assert_eq!(
            split_items(["API ### UI###", "UI###99% uptime", ""]),
            vec!["99% uptime", "API", "UI"]
        );
    }

    #[test]
    fn architecture_link_only_when_configured() {
        let mut p = project();
        let links = project_links(&p, "https://jira.example.com/", "https://wiki.example.com");
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].href, "https://jira.example.com/browse/APO-1");
        assert_eq!(
            links[1].href,
            "https://wiki.example.com/pages/viewpage.action?pageId=4242"
        );

        p.architecture_url = Some("https://wiki.example.com/arch".to_string());
        let links = project_links(&p, "https://jira.example.com", "https://wiki.example.com");
        assert_eq!(links.len(), 3);
        assert_eq!(links[2].label, "Platform architecture");
    }

    #[test]
    fn assemble_sorts_categories_and_merges_deliverables() {
        let rollups = Rollups {
            achievements: vec!["b".to_string(), "a".to_string()],
            focus: vec![],
            next_steps: vec!["z".to_string(), "z".to_string()],
            risks: vec![],
        };
        let report = assemble(&project(), rollups, vec![], "https://j", "https://w");
        assert_eq!(report.page_id, "4242");
        assert_eq!(report.description, "Launch the billing platform");
        assert_eq!(report.achievements, vec!["a", "b"]);
        assert_eq!(report.next_steps, vec!["z"]);
        assert_eq!(report.deliverables, vec!["99% uptime", "API", "UI"]);
    }
}
