//! Terminology tables for English → Ukrainian technical translation.
//!
//! Three tables live here so every consumer reads the same vocabulary:
//!
//! * [`KEEP_AS_IS`] — terms the model must leave in English. Injected into
//!   the translation prompt.
//! * [`TECH_GLOSSARY`] — English → Ukrainian renderings, emitted as an
//!   optional glossary document by [`build_glossary_note`].
//! * [`ANNOTATION_TERMS`] — Ukrainian → English pairs used by the term
//!   annotator to append the English original to the first occurrence.

/// Terms preserved in English in the translated text.
pub const KEEP_AS_IS: &[&str] = &[
    // Roles
    "software architect",
    "software architecture",
    "software engineering",
    "software developer",
    "software development",
    // Infrastructure and tools
    "API", "REST", "GraphQL", "gRPC", "HTTP", "HTTPS", "TCP", "UDP",
    "Docker", "Kubernetes", "CI/CD", "DevOps", "GitOps",
    "SQL", "NoSQL", "MongoDB", "PostgreSQL", "Redis", "Kafka",
    "AWS", "GCP", "Azure", "SaaS", "PaaS", "IaaS",
    // Patterns
    "microservices", "monolith", "event-driven", "pipeline",
    "SOLID", "DDD", "TDD", "BDD",
    // Abbreviations
    "ADR", "SLA", "SLO", "SLI", "RTO", "RPO",
];

/// English term → Ukrainian rendering.
pub const TECH_GLOSSARY: &[(&str, &str)] = &[
    // Roles
    ("architect", "архітектор"),
    ("developer", "розробник"),
    ("stakeholder", "зацікавлена сторона"),
    ("stakeholders", "зацікавлені сторони"),
    // Architecture concepts
    ("architecture characteristics", "архітектурні характеристики"),
    ("architecture characteristic", "архітектурна характеристика"),
    ("architectural quantum", "архітектурний квант"),
    ("architectural quanta", "архітектурні кванти"),
    ("fitness function", "фітнес-функція"),
    ("fitness functions", "фітнес-функції"),
    ("bounded context", "обмежений контекст"),
    ("bounded contexts", "обмежені контексти"),
    ("component", "компонент"),
    ("components", "компоненти"),
    ("deployment unit", "одиниця розгортання"),
    // Quality attributes
    ("scalability", "масштабованість"),
    ("availability", "доступність"),
    ("reliability", "надійність"),
    ("maintainability", "зручність супроводу"),
    ("testability", "тестованість"),
    ("deployability", "придатність до розгортання"),
    ("agility", "гнучкість"),
    ("elasticity", "еластичність"),
    ("performance", "продуктивність"),
    ("security", "безпека"),
    ("observability", "спостережуваність"),
    ("fault tolerance", "відмовостійкість"),
    ("recoverability", "відновлюваність"),
    // Structure
    ("coupling", "зв'язаність"),
    ("cohesion", "зчепленість"),
    ("modularity", "модульність"),
    ("abstraction", "абстракція"),
    ("encapsulation", "інкапсуляція"),
    ("connascence", "конасценція"),
    ("afferent coupling", "доцентрова зв'язаність"),
    ("efferent coupling", "відцентрова зв'язаність"),
    ("abstractness", "абстрактність"),
    ("instability", "нестабільність"),
    ("distance from the main sequence", "відстань від головної послідовності"),
    // Architecture styles
    ("layered architecture", "шарувата архітектура"),
    ("microkernel architecture", "мікроядерна архітектура"),
    ("service-based architecture", "сервісно-орієнтована архітектура"),
    ("event-driven architecture", "подієво-орієнтована архітектура"),
    ("space-based architecture", "просторово-орієнтована архітектура"),
    ("pipeline architecture", "конвеєрна архітектура"),
    (
        "orchestration-driven service-oriented architecture",
        "оркестраційно-керована сервісно-орієнтована архітектура",
    ),
    ("microservices architecture", "мікросервісна архітектура"),
    ("big ball of mud", "великий клубок бруду"),
    // Patterns
    ("trade-off", "компроміс"),
    ("trade-offs", "компроміси"),
    ("anti-pattern", "антипатерн"),
    ("anti-patterns", "антипатерни"),
    ("design pattern", "патерн проєктування"),
    ("design patterns", "патерни проєктування"),
    ("broker topology", "топологія брокера"),
    ("mediator topology", "топологія медіатора"),
    ("orchestration", "оркестрація"),
    ("choreography", "хореографія"),
    ("saga", "сага"),
    ("sagas", "саги"),
    // Engineering practices
    ("continuous delivery", "безперервне постачання"),
    ("continuous integration", "безперервна інтеграція"),
    ("continuous deployment", "безперервне розгортання"),
    ("refactoring", "рефакторинг"),
    ("technical debt", "технічний борг"),
    ("code review", "перегляд коду"),
    ("pull request", "запит на злиття"),
    // Decision-making
    ("architecture decision record", "запис архітектурного рішення"),
    ("architecture decision records", "записи архітектурних рішень"),
    ("risk assessment", "оцінка ризиків"),
    ("risk matrix", "матриця ризиків"),
    ("risk storming", "штурм ризиків"),
    // Teams and processes
    ("agile", "гнучка методологія (Agile)"),
    ("scrum", "Scrum"),
    ("team topology", "топологія команди"),
    ("domain-driven design", "предметно-орієнтоване проєктування (DDD)"),
    ("extreme programming", "екстремальне програмування (XP)"),
];

/// Ukrainian term → English original, for first-occurrence annotation.
pub const ANNOTATION_TERMS: &[(&str, &str)] = &[
    // Core concepts
    ("зв'язаність", "coupling"),
    ("зчепленість", "cohesion"),
    ("модульність", "modularity"),
    ("абстракція", "abstraction"),
    ("абстрактність", "abstractness"),
    ("нестабільність", "instability"),
    ("конасценція", "connascence"),
    ("доцентрова зв'язаність", "afferent coupling"),
    ("відцентрова зв'язаність", "efferent coupling"),
    // Architecture characteristics
    ("архітектурні характеристики", "architecture characteristics"),
    ("архітектурна характеристика", "architecture characteristic"),
    ("архітектурний квант", "architecture quantum"),
    ("фітнес-функція", "fitness function"),
    ("обмежений контекст", "bounded context"),
    // Quality attributes
    ("масштабованість", "scalability"),
    ("доступність", "availability"),
    ("надійність", "reliability"),
    ("зручність супроводу", "maintainability"),
    ("тестованість", "testability"),
    ("придатність до розгортання", "deployability"),
    ("еластичність", "elasticity"),
    ("продуктивність", "performance"),
    ("спостережуваність", "observability"),
    ("відмовостійкість", "fault tolerance"),
    ("відновлюваність", "recoverability"),
    // Architecture styles
    ("шарувата архітектура", "layered architecture"),
    ("мікроядерна архітектура", "microkernel architecture"),
    ("конвеєрна архітектура", "pipeline architecture"),
    ("мікросервісна архітектура", "microservices architecture"),
    ("мікросервіси", "microservices"),
    ("великий клубок бруду", "big ball of mud"),
    // Patterns and decisions
    ("антипатерн", "anti-pattern"),
    ("антипатерни", "anti-patterns"),
    ("запис архітектурного рішення", "ADR"),
    ("штурм ризиків", "risk storming"),
    ("матриця ризиків", "risk matrix"),
    // Engineering
    ("безперервне постачання", "continuous delivery"),
    ("безперервна інтеграція", "continuous integration"),
    ("безперервне розгортання", "continuous deployment"),
    ("технічний борг", "technical debt"),
    ("рефакторинг", "refactoring"),
    ("оркестрація", "orchestration"),
    ("хореографія", "choreography"),
    ("сага", "saga"),
    ("компроміс", "trade-off"),
];

/// Markdown glossary section: a two-column table sorted by English term.
pub fn build_glossary_note() -> String {
    let mut entries: Vec<&(&str, &str)> = TECH_GLOSSARY.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = String::from("## Глосарій технічних термінів\n\n");
    out.push_str("| Англійський термін | Українське значення |\n");
    out.push_str("|---|---|");
    for (en, uk) in entries {
        out.push_str(&format!("\n| {en} | {uk} |"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn glossary_note_is_sorted_table() {
        let note = build_glossary_note();
        assert!(note.starts_with("## Глосарій технічних термінів"));
        let rows: Vec<&str> = note.lines().filter(|l| l.starts_with("| ") && !l.contains("Англійський")).collect();
        assert_eq!(rows.len(), TECH_GLOSSARY.len());
        assert!(rows[0].starts_with("| abstraction |"), "first row: {}", rows[0]);
        let keys: Vec<&str> = rows.iter().map(|r| r.split('|').nth(1).unwrap_or("").trim()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn annotation_terms_are_unique() {
        let mut seen = HashSet::new();
        for (uk, _) in ANNOTATION_TERMS {
            assert!(seen.insert(uk.to_lowercase()), "duplicate term {uk}");
        }
    }

    #[test]
    fn keep_as_is_contains_role_terms() {
        assert!(KEEP_AS_IS.contains(&"software architect"));
        assert!(KEEP_AS_IS.contains(&"software architecture"));
    }
}
