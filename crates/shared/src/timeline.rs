use chrono::{DateTime, Utc};

use crate::bias::{compose_leaning_bar, compose_ownership_bar, Segment};
use crate::encoded::Article;
use crate::models::ClusterRecord;

const DATE_FORMAT: &str = "%d-%m-%Y %H:%M";

/// Left-blindspot and right-blindspot clusters alternate at the top of the
/// page (left first, leftovers of the longer side after), followed by every
/// other cluster in the order given.
pub fn front_page_order(clusters: &[ClusterRecord]) -> Vec<&ClusterRecord> {
    let left: Vec<_> = clusters.iter().filter(|c| c.is_blindspot_left()).collect();
    let right: Vec<_> = clusters
        .iter()
        .filter(|c| !c.is_blindspot_left() && c.is_blindspot_right())
        .collect();
    let rest = clusters
        .iter()
        .filter(|c| !c.is_blindspot_left() && !c.is_blindspot_right());

    let mut ordered = Vec::with_capacity(clusters.len());
    let mut left_iter = left.into_iter();
    let mut right_iter = right.into_iter();
    loop {
        match (left_iter.next(), right_iter.next()) {
            (None, None) => break,
            (l, r) => ordered.extend(l.into_iter().chain(r)),
        }
    }
    ordered.extend(rest);
    ordered
}

pub struct TimelinePage;

impl TimelinePage {
    fn format_date(date: Option<DateTime<Utc>>) -> String {
        date.map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default()
    }

    pub fn generate(clusters: &[ClusterRecord], generated_at: DateTime<Utc>) -> String {
        let mut html = String::new();

        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("  <meta charset=\"UTF-8\">\n");
        html.push_str(
            "  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
        );
        html.push_str("  <title>News Timeline</title>\n");
        html.push_str("  <style>\n");
        html.push_str("    body { font-family: Arial, sans-serif; max-width: 720px; margin: 40px auto; padding: 0 20px; line-height: 1.5; background: #F5F0E8; color: #1A1A1A; }\n");
        html.push_str("    h1 { border-bottom: 1px solid #8A8070; padding-bottom: 10px; }\n");
        html.push_str("    h1 .generated { display: block; font-size: 0.5em; font-weight: normal; color: #5A5A5A; }\n");
        html.push_str("    .cluster { border: 1px solid #D0C9BA; margin: 16px 0; padding: 12px 16px; background: #FFFFFF; }\n");
        html.push_str("    .cluster h2 { font-size: 18px; margin: 0; display: inline; }\n");
        html.push_str("    .blindspot-tag { margin-left: 8px; padding: 2px 6px; font-size: 12px; color: #FFFFFF; }\n");
        html.push_str("    .blindspot-tag--left { background: #2563EB; }\n");
        html.push_str("    .blindspot-tag--right { background: #DC2626; }\n");
        html.push_str("    .metadata { color: #5A5A5A; font-size: 13px; margin: 6px 0; }\n");
        html.push_str("    .metadata span + span::before { content: ' · '; }\n");
        html.push_str("    .bar-label { font-size: 12px; text-transform: uppercase; color: #5A5A5A; margin-top: 8px; }\n");
        html.push_str("    .bar { display: flex; height: 22px; background: #EDEDE5; overflow: hidden; }\n");
        html.push_str("    .segment { height: 100%; color: #FFFFFF; font-size: 11px; line-height: 22px; text-align: center; white-space: nowrap; overflow: hidden; }\n");
        html.push_str("    .bar-empty { font-size: 12px; color: #8A8070; }\n");
        html.push_str("    details.articles { margin-top: 10px; }\n");
        html.push_str("    details.articles > summary { cursor: pointer; color: #5A5A5A; }\n");
        html.push_str("    .article { margin: 6px 0; }\n");
        html.push_str("    .article .feed { color: #5A5A5A; font-size: 12px; margin-right: 6px; }\n");
        html.push_str("  </style>\n");
        html.push_str("</head>\n<body>\n");

        html.push_str(&format!(
            "<h1>News Timeline<span class=\"generated\">Updated {}</span></h1>\n",
            generated_at.format(DATE_FORMAT)
        ));

        if clusters.is_empty() {
            html.push_str("<p class=\"empty\">No stories to show yet.</p>\n");
        }

        for cluster in front_page_order(clusters) {
            Self::push_cluster(&mut html, cluster);
        }

        html.push_str("</body>\n</html>");
        html
    }

    fn push_cluster(html: &mut String, cluster: &ClusterRecord) {
        html.push_str(&format!(
            "<div class=\"cluster\" data-cluster-id=\"{}\">\n",
            cluster.cluster_id
        ));
        html.push_str(&format!(
            "  <h2>{}</h2>",
            Self::escape_html(cluster.display_title())
        ));
        if cluster.is_blindspot_left() {
            html.push_str("<span class=\"blindspot-tag blindspot-tag--left\">Blindspot for the left</span>");
        } else if cluster.is_blindspot_right() {
            html.push_str("<span class=\"blindspot-tag blindspot-tag--right\">Blindspot for the right</span>");
        }
        html.push('\n');

        html.push_str("  <div class=\"metadata\">");
        if let Some(n) = cluster.num_articles {
            html.push_str(&format!("<span>{} articles</span>", n));
        }
        if let Some(n) = cluster.num_feeds {
            html.push_str(&format!("<span>{} sources</span>", n));
        }
        if cluster.max_published_date.is_some() {
            html.push_str(&format!(
                "<span>{}</span>",
                Self::format_date(cluster.max_published_date)
            ));
        }
        html.push_str("</div>\n");

        html.push_str("  <div class=\"bar-label\">Political leaning</div>\n");
        Self::push_bar(html, "leaning", &compose_leaning_bar(cluster));
        html.push_str("  <div class=\"bar-label\">Ownership reach</div>\n");
        Self::push_bar(html, "ownership", &compose_ownership_bar(cluster));

        let articles = cluster.parsed_articles();
        if !articles.is_empty() {
            html.push_str("  <details class=\"articles\">\n");
            html.push_str(&format!(
                "    <summary>Articles ({})</summary>\n",
                articles.len()
            ));
            for article in &articles {
                html.push_str(&format!("    {}\n", Self::article_html(article)));
            }
            html.push_str("  </details>\n");
        }

        html.push_str("</div>\n");
    }

    fn push_bar(html: &mut String, kind: &str, segments: &[Segment]) {
        if segments.is_empty() {
            html.push_str(&format!(
                "  <div class=\"bar-empty bar-{}\">No data</div>\n",
                kind
            ));
            return;
        }

        html.push_str(&format!("  <div class=\"bar bar-{}\">", kind));
        for segment in segments {
            html.push_str(&format!(
                "<div class=\"segment\" style=\"width: {:.1}%; background-color: {};\" title=\"{}\">{}</div>",
                segment.width_percent,
                segment.color,
                Self::escape_html(&segment.label),
                segment
                    .caption()
                    .map(|c| Self::escape_html(&c))
                    .unwrap_or_default()
            ));
        }
        html.push_str("</div>\n");
    }

    fn article_html(article: &Article) -> String {
        let feed = Self::escape_html(&article.feed);
        let title = Self::escape_html(&article.title);

        match article.href() {
            Some(href) => format!(
                "<div class=\"article\"><span class=\"feed\">{}</span><a href=\"{}\" target=\"_blank\" rel=\"noopener\">{}</a></div>",
                feed,
                Self::escape_html(href),
                title
            ),
            None => format!(
                "<div class=\"article\"><span class=\"feed\">{}</span>{}</div>",
                feed, title
            ),
        }
    }

    fn escape_html(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&#39;")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use scraper::{Html, Selector};

    fn generated_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap()
    }

    fn flagged(cluster_id: i64, left: bool, right: bool) -> ClusterRecord {
        ClusterRecord {
            blindspot_left: Some(left),
            blindspot_right: Some(right),
            ..ClusterRecord::new(cluster_id)
        }
    }

    fn page_ids(html: &str) -> Vec<i64> {
        let doc = Html::parse_document(html);
        let selector = Selector::parse("div.cluster").unwrap();
        doc.select(&selector)
            .map(|el| el.value().attr("data-cluster-id").unwrap().parse().unwrap())
            .collect()
    }

    #[test]
    fn test_front_page_interleaves_blindspots() {
        let clusters = vec![
            flagged(1, false, false),
            flagged(2, true, false),
            flagged(3, false, true),
            flagged(4, true, false),
            flagged(5, true, false),
            flagged(6, false, false),
            flagged(7, false, true),
        ];

        let ids: Vec<i64> = front_page_order(&clusters)
            .iter()
            .map(|c| c.cluster_id)
            .collect();

        assert_eq!(ids, vec![2, 3, 4, 7, 5, 1, 6]);
    }

    #[test]
    fn test_front_page_keeps_every_cluster_once() {
        let clusters = vec![flagged(1, true, true), flagged(2, false, true)];

        let ids: Vec<i64> = front_page_order(&clusters)
            .iter()
            .map(|c| c.cluster_id)
            .collect();

        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_generate_renders_clusters_in_page_order() {
        let clusters = vec![flagged(10, false, false), flagged(11, false, true)];
        let html = TimelinePage::generate(&clusters, generated_at());

        assert_eq!(page_ids(&html), vec![11, 10]);
        assert!(html.contains("Blindspot for the right"));
        assert!(html.contains("Updated 01-02-2026 12:00"));
    }

    #[test]
    fn test_generate_escapes_special_chars() {
        let cluster = ClusterRecord {
            title: Some("Apple & <Google>".to_string()),
            articles: Some(
                r#"[{"title": "Say \"hi\"", "feed": "nos.nl", "url": "https://nos.nl/a?x=1&y=2"}]"#
                    .to_string(),
            ),
            ..ClusterRecord::new(1)
        };
        let html = TimelinePage::generate(&[cluster], generated_at());

        assert!(html.contains("Apple &amp; &lt;Google&gt;"));
        assert!(html.contains("Say &quot;hi&quot;"));
        assert!(html.contains("href=\"https://nos.nl/a?x=1&amp;y=2\""));
    }

    #[test]
    fn test_generate_renders_bars_and_metadata() {
        let cluster = ClusterRecord {
            title: Some("Storm".to_string()),
            num_articles: Some(14),
            num_feeds: Some(9),
            max_published_date: Some(Utc.with_ymd_and_hms(2026, 2, 1, 8, 5, 0).unwrap()),
            left: Some(1.0),
            right: Some(1.0),
            owner_reach: Some(r#"{"DPG Media": 0.6}"#.to_string()),
            ..ClusterRecord::new(3)
        };
        let html = TimelinePage::generate(&[cluster], generated_at());
        let doc = Html::parse_document(&html);

        let leaning = Selector::parse("div.bar-leaning div.segment").unwrap();
        let captions: Vec<String> = doc
            .select(&leaning)
            .map(|el| el.text().collect::<String>())
            .collect();
        assert_eq!(captions, vec!["Left 50%", "Right 50%"]);

        let ownership = Selector::parse("div.bar-ownership div.segment").unwrap();
        assert_eq!(doc.select(&ownership).count(), 1);

        assert!(html.contains("<span>14 articles</span>"));
        assert!(html.contains("<span>9 sources</span>"));
        assert!(html.contains("<span>01-02-2026 08:05</span>"));
    }

    #[test]
    fn test_generate_survives_malformed_fields() {
        let cluster = ClusterRecord {
            owner_reach: Some("{broken".to_string()),
            articles: Some("[{".to_string()),
            ..ClusterRecord::new(5)
        };
        let html = TimelinePage::generate(&[cluster], generated_at());
        let doc = Html::parse_document(&html);

        let empty = Selector::parse("div.bar-empty").unwrap();
        assert_eq!(doc.select(&empty).count(), 2);
        assert!(!html.contains("<details class=\"articles\">"));
        assert!(html.contains("Untitled story"));
    }

    #[test]
    fn test_article_without_safe_url_is_plain_text() {
        let article = Article {
            title: "Plain".to_string(),
            feed: "nu.nl".to_string(),
            url: Some("javascript:void(0)".to_string()),
        };

        let html = TimelinePage::article_html(&article);
        assert!(!html.contains("<a "));
        assert!(html.contains("Plain"));
    }

    #[test]
    fn test_generate_empty_page() {
        let html = TimelinePage::generate(&[], generated_at());

        assert!(html.contains("No stories to show yet."));
        assert!(page_ids(&html).is_empty());
    }

    #[test]
    fn test_escape_html_combined() {
        assert_eq!(
            TimelinePage::escape_html("<a href=\"test\">Click & Go</a>"),
            "&lt;a href=&quot;test&quot;&gt;Click &amp; Go&lt;/a&gt;"
        );
    }
}
