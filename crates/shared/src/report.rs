use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{AnnotatedItem, CuratedItem, InsightBundle};

pub struct ReportBuilder;

impl ReportBuilder {
    fn format_date(date_str: &str) -> String {
        if let Ok(dt) = date_str.parse::<DateTime<Utc>>() {
            return dt.format("%Y-%m-%d").to_string();
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
            return dt.format("%Y-%m-%d").to_string();
        }
        // Fallback to original string
        date_str.to_string()
    }

    pub fn subject(date: DateTime<Local>) -> String {
        format!("[News Brief] Daily AI Brief - {}", date.format("%Y-%m-%d"))
    }

    pub fn build_html(
        curated: &[CuratedItem],
        items: &[AnnotatedItem],
        insights: &InsightBundle,
        date: DateTime<Local>,
    ) -> String {
        let mut html = String::new();

        let formatted_date = date.format("%Y. %m. %d (%a)").to_string();

        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
        html.push_str("  <meta charset=\"UTF-8\">\n");
        html.push_str(&format!(
            "  <title>News Brief - {}</title>\n",
            Self::escape_html(&formatted_date)
        ));
        html.push_str("  <style>\n");
        html.push_str("    body { font-family: -apple-system, BlinkMacSystemFont, system-ui, Roboto, sans-serif; line-height: 1.6; color: #333; margin: 0; padding: 0; background-color: #f4f6f8; }\n");
        html.push_str("    .container { max-width: 700px; margin: 0 auto; background: #ffffff; }\n");
        html.push_str("    .header { background: #1a2980; padding: 40px 30px; text-align: center; color: white; }\n");
        html.push_str("    .header h1 { margin: 0; font-size: 28px; }\n");
        html.push_str("    .date-badge { display: inline-block; padding: 4px 12px; border-radius: 20px; font-size: 13px; margin-bottom: 15px; background: rgba(255,255,255,0.2); }\n");
        html.push_str("    .content { padding: 30px; }\n");
        html.push_str("    .section-title { margin: 40px 0 20px; font-size: 20px; font-weight: 700; border-bottom: 2px solid #1a202c; padding-bottom: 10px; }\n");
        html.push_str("    .card { border: 1px solid #e2e8f0; border-radius: 12px; padding: 20px; margin-bottom: 20px; }\n");
        html.push_str("    .tag { display: inline-block; background: #ebf8ff; color: #2b6cb0; font-size: 12px; font-weight: bold; padding: 4px 8px; border-radius: 4px; }\n");
        html.push_str("    .article-title { font-size: 18px; font-weight: 700; color: #2d3748; text-decoration: none; display: block; margin: 8px 0 4px; }\n");
        html.push_str("    .meta { font-size: 12px; color: #718096; margin-bottom: 10px; }\n");
        html.push_str("    .reason { font-size: 14px; background-color: #f7fafc; padding: 12px; border-radius: 8px; border-left: 4px solid #4299e1; }\n");
        html.push_str("    .summary { font-size: 14px; color: #4a5568; }\n");
        html.push_str("    .category-header { background-color: #edf2f7; padding: 8px 15px; border-radius: 6px; font-weight: bold; margin: 30px 0 15px; }\n");
        html.push_str("    .footer { background: #2d3748; color: #a0aec0; text-align: center; padding: 30px; font-size: 13px; }\n");
        html.push_str("  </style>\n");
        html.push_str("</head>\n<body>\n<div class=\"container\">\n");

        html.push_str("<div class=\"header\">\n");
        html.push_str(&format!(
            "  <div class=\"date-badge\">{}</div>\n",
            Self::escape_html(&formatted_date)
        ));
        html.push_str("  <h1>News Brief</h1>\n");
        html.push_str("  <p>Today's AI trends and in-depth analysis</p>\n");
        html.push_str("</div>\n<div class=\"content\">\n");

        if !insights.is_empty() {
            Self::push_insights(&mut html, insights, curated);
        }

        html.push_str("<div class=\"section-title\">Top Articles</div>\n");
        if curated.is_empty() {
            html.push_str("<p class=\"meta\">No articles were selected today.</p>\n");
        }
        for (index, article) in curated.iter().enumerate() {
            let item = &article.item;
            html.push_str("<div class=\"card\">\n");
            html.push_str(&format!("  <span class=\"tag\">TOP {:02}</span>\n", index + 1));
            html.push_str(&format!(
                "  <a href=\"{}\" class=\"article-title\" target=\"_blank\">{}</a>\n",
                Self::escape_html(&item.source.link),
                Self::escape_html(item.display_title())
            ));
            html.push_str(&format!(
                "  <div class=\"meta\">{} | {}</div>\n",
                Self::escape_html(&item.source.source),
                Self::format_date(&item.source.published_at)
            ));
            if !article.selection_justification.is_empty() {
                html.push_str(&format!(
                    "  <div class=\"reason\"><strong>Why it matters:</strong> {}</div>\n",
                    Self::escape_html(&article.selection_justification)
                ));
            }
            Self::push_body(&mut html, item);
            html.push_str("</div>\n");
        }

        let curated_links: HashSet<&str> = curated
            .iter()
            .map(|c| c.item.source.link.as_str())
            .collect();
        let remaining: Vec<&AnnotatedItem> = items
            .iter()
            .filter(|i| !curated_links.contains(i.source.link.as_str()))
            .collect();

        if !remaining.is_empty() {
            html.push_str("<div class=\"section-title\">More News by Category</div>\n");
            for (category, group) in Self::group_by_category(&remaining) {
                html.push_str(&format!(
                    "<div class=\"category-header\">{}</div>\n",
                    Self::escape_html(category)
                ));
                for item in group {
                    html.push_str("<div class=\"card\">\n");
                    html.push_str(&format!(
                        "  <a href=\"{}\" class=\"article-title\" target=\"_blank\">{}</a>\n",
                        Self::escape_html(&item.source.link),
                        Self::escape_html(item.display_title())
                    ));
                    html.push_str(&format!(
                        "  <div class=\"meta\">{} | {}</div>\n",
                        Self::escape_html(&item.source.source),
                        Self::format_date(&item.source.published_at)
                    ));
                    Self::push_body(&mut html, item);
                    html.push_str("</div>\n");
                }
            }
        }

        html.push_str("</div>\n");
        html.push_str("<div class=\"footer\">Generated by <strong>News Brief</strong></div>\n");
        html.push_str("</div>\n</body>\n</html>");
        html
    }

    fn push_insights(html: &mut String, insights: &InsightBundle, curated: &[CuratedItem]) {
        html.push_str("<div class=\"section-title\">Insights</div>\n");

        if !insights.key_issues.is_empty() {
            html.push_str("<h3>Key Issues</h3>\n");
            for issue in &insights.key_issues {
                html.push_str("<div class=\"card\">\n");
                html.push_str(&format!("  <h4>{}</h4>\n", Self::escape_html(&issue.title)));
                html.push_str(&format!(
                    "  <p class=\"summary\">{}</p>\n",
                    Self::escape_html(&issue.description)
                ));
                if let Some(article) = issue.related_index.and_then(|i| curated.get(i)) {
                    html.push_str(&format!(
                        "  <div class=\"meta\">Related: {}</div>\n",
                        Self::escape_html(article.item.display_title())
                    ));
                }
                html.push_str("</div>\n");
            }
        }

        if !insights.implications.trim().is_empty() {
            html.push_str("<h3>Implications</h3>\n");
            html.push_str(&format!(
                "<div class=\"reason\">{}</div>\n",
                Self::escape_multiline(&insights.implications)
            ));
        }

        if !insights.action_items.is_empty() {
            html.push_str("<h3>Action Items</h3>\n<ul>\n");
            for action in &insights.action_items {
                html.push_str(&format!("  <li>{}</li>\n", Self::escape_html(action)));
            }
            html.push_str("</ul>\n");
        }
    }

    fn push_body(html: &mut String, item: &AnnotatedItem) {
        if !item.core_summary().is_empty() {
            html.push_str(&format!(
                "  <p class=\"summary\">{}</p>\n",
                Self::escape_html(item.core_summary())
            ));
        } else if !item.source.summary.is_empty() {
            html.push_str(&format!(
                "  <p class=\"summary\">{}</p>\n",
                Self::escape_html(&item.source.summary)
            ));
        }
        if !item.detailed_explanation().is_empty() {
            html.push_str(&format!(
                "  <p class=\"summary\">{}</p>\n",
                Self::escape_multiline(item.detailed_explanation())
            ));
        }
    }

    /// Groups in first-seen category order; blank categories land in "Others".
    fn group_by_category<'a>(items: &[&'a AnnotatedItem]) -> Vec<(&'a str, Vec<&'a AnnotatedItem>)> {
        let mut groups: Vec<(&'a str, Vec<&'a AnnotatedItem>)> = Vec::new();
        for &item in items {
            let category = match item.source.category.trim() {
                "" => "Others",
                c => c,
            };
            match groups.iter_mut().find(|(name, _)| *name == category) {
                Some((_, group)) => group.push(item),
                None => groups.push((category, vec![item])),
            }
        }
        groups
    }

    fn escape_html(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&#39;")
    }

    fn escape_multiline(text: &str) -> String {
        Self::escape_html(text).replace('\n', "<br>\n")
    }

    pub fn save(content: &str, dir: &Path, date: DateTime<Local>) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create report directory: {}", dir.display()))?;
        let filepath = dir.join(format!("news-brief-{}.html", date.format("%Y-%m-%d")));

        fs::write(&filepath, content).context("Failed to write report file")?;

        Ok(filepath)
    }
}
