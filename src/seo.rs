//! Rule-based content quality scoring.
//!
//! A fixed penalty table over an article's SEO fields. Pure and
//! deterministic: same record in, same report out, no I/O.

use serde::Serialize;

use crate::model::Article;

/// Scoring report for one article.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Audit {
    /// 0–100, higher is better.
    pub score: u8,
    /// Human-readable findings, one per failing rule.
    pub issues: Vec<String>,
}

/// Score an article against the rule table. `site_domain` is the site's own
/// host, used to recognize absolute internal links; empty means only
/// relative links count as internal.
pub fn audit_article(article: &Article, site_domain: &str) -> Audit {
    let mut score: i32 = 100;
    let mut issues = vec![];

    let body = article.content.as_deref().unwrap_or("");
    let display_title = article
        .meta_title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(&article.title);
    let keyword = article
        .focus_keyword
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty());

    match keyword {
        None => {
            score -= 20;
            issues.push("Missing focus keyword".into());
        }
        Some(keyword) => {
            if !contains_ci(body, keyword) {
                score -= 20;
                issues.push("Focus keyword does not appear in the body".into());
            }
            if !contains_ci(display_title, keyword) {
                score -= 10;
                issues.push("Focus keyword does not appear in the title".into());
            }
        }
    }

    let words = word_count(body);
    if words < 300 {
        score -= 15;
        issues.push(format!("Body has {words} words; aim for at least 300"));
    }

    if article
        .meta_description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .is_none()
    {
        score -= 15;
        issues.push("Missing meta description".into());
    }

    if display_title.chars().count() > 60 {
        score -= 10;
        issues.push("Title exceeds 60 characters".into());
    }

    if internal_link_count(body, site_domain) == 0 {
        score -= 10;
        issues.push("No internal links in the body".into());
    }

    // advisory only, not part of the penalty table
    if article.image_url.trim().is_empty() {
        issues.push("Missing cover image".into());
    }

    Audit {
        score: score.max(0) as u8,
        issues,
    }
}

/// Count words in an HTML fragment, stripping markup first:
/// `"<p>one two</p>"` counts 2 words, tags are never tokens.
pub fn word_count(html: &str) -> usize {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            c if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.split_whitespace().count()
}

/// Count links pointing back into the site: relative `href="/..."` plus
/// absolute `href="http(s)://<domain>..."`.
fn internal_link_count(html: &str, domain: &str) -> usize {
    let mut count = html.matches("href=\"/").count();
    if !domain.is_empty() {
        for scheme in ["http", "https"] {
            let prefix = format!("href=\"{scheme}://{domain}");
            count += html.matches(prefix.as_str()).count();
        }
    }
    count
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_with(words: usize, extra: &str) -> String {
        let filler = "luz ".repeat(words);
        format!("<p>{filler}{extra}</p>")
    }

    fn full_article() -> Article {
        Article {
            id: "a1".into(),
            title: "Banho de proteção com arruda".into(),
            excerpt: "Um banho simples.".into(),
            content: Some(body_with(
                300,
                "arruda <a href=\"/artigos/ervas\">ervas</a>",
            )),
            author: "Mãe Celina".into(),
            date: "".into(),
            tags: vec![],
            image_url: "https://cdn.example.com/arruda.jpg".into(),
            likes: 0,
            vip: false,
            faq: None,
            meta_title: Some("Banho de proteção com arruda".into()),
            meta_description: Some("Como preparar o banho de arruda.".into()),
            focus_keyword: Some("arruda".into()),
            created_at: 0,
        }
    }

    #[test]
    fn perfect_record_scores_one_hundred() {
        let audit = audit_article(&full_article(), "example.com");
        assert_eq!(audit.score, 100);
        assert!(audit.issues.is_empty());
    }

    #[test]
    fn failing_rules_accumulate_and_never_go_negative() {
        let article = Article {
            content: Some("<p>curto</p>".into()),
            meta_title: Some("x".repeat(61)),
            meta_description: None,
            focus_keyword: None,
            image_url: "".into(),
            ..full_article()
        };
        let audit = audit_article(&article, "example.com");
        assert_eq!(audit.score, 100 - 20 - 15 - 15 - 10 - 10);
        assert!(audit.issues.iter().any(|i| i.contains("focus keyword")));
        assert!(audit.issues.iter().any(|i| i.contains("cover image")));

        // a keyword that matches nothing swaps the missing-keyword penalty
        // for the two occurrence penalties; still bounded below by zero
        let article = Article {
            focus_keyword: Some("alecrim".into()),
            ..article
        };
        let audit = audit_article(&article, "example.com");
        assert_eq!(audit.score, 100 - 20 - 10 - 15 - 15 - 10 - 10);
    }

    #[test]
    fn score_is_monotone_under_added_violations() {
        let mut article = full_article();
        let mut last = audit_article(&article, "example.com").score;
        article.meta_description = None;
        let s = audit_article(&article, "example.com").score;
        assert!(s <= last);
        last = s;
        article.content = Some(body_with(10, "arruda"));
        let s = audit_article(&article, "example.com").score;
        assert!(s <= last);
        last = s;
        article.focus_keyword = Some("alecrim".into());
        let s = audit_article(&article, "example.com").score;
        assert!(s <= last);
    }

    #[test]
    fn audit_is_pure() {
        let article = full_article();
        let a = audit_article(&article, "example.com");
        let b = audit_article(&article, "example.com");
        assert_eq!(a, b);
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        let mut article = full_article();
        article.focus_keyword = Some("ARRUDA".into());
        let audit = audit_article(&article, "example.com");
        assert_eq!(audit.score, 100);
    }

    #[test]
    fn keyword_absent_from_title_penalizes_ten() {
        let mut article = full_article();
        article.meta_title = Some("Banho de proteção".into());
        let audit = audit_article(&article, "example.com");
        assert_eq!(audit.score, 90);
        assert!(audit
            .issues
            .iter()
            .any(|i| i.contains("does not appear in the title")));
    }

    #[test]
    fn title_rule_falls_back_to_the_article_title() {
        let mut article = full_article();
        article.meta_title = None;
        article.title = format!("arruda {}", "x".repeat(60));
        let audit = audit_article(&article, "example.com");
        assert_eq!(audit.score, 90);
        assert!(audit.issues.iter().any(|i| i.contains("60 characters")));
    }

    #[test]
    fn absolute_links_to_own_domain_are_internal() {
        let mut article = full_article();
        article.content = Some(body_with(
            300,
            "arruda <a href=\"https://example.com/artigos\">mais</a>",
        ));
        assert_eq!(audit_article(&article, "example.com").score, 100);
        // a foreign domain is not an internal link
        article.content = Some(body_with(
            300,
            "arruda <a href=\"https://other.com/x\">fora</a>",
        ));
        assert_eq!(audit_article(&article, "example.com").score, 90);
    }

    #[test]
    fn word_count_strips_markup() {
        assert_eq!(word_count("<p>one two</p>"), 2);
        assert_eq!(word_count("one<br/>two"), 2);
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("<div class=\"x\"></div>"), 0);
    }
}
