use serde_json::Value;

use crate::oracle::{CritiqueRequest, CritiqueSubject};
use crate::schema::{EntityType, ExtractionTarget};

pub const EXTRACTION_SYSTEM: &str = "You are an expert in extracting structured information about planetary health from academic texts. Always include supporting text that justifies each extraction.";

pub const RELATIONSHIP_SYSTEM: &str =
    "You are an expert in extracting relationships between entities in planetary health texts.";

pub const CRITIC_SYSTEM: &str = "You are a critical evaluator of knowledge graph extractions. Provide detailed, constructive evaluation with specific scores and actionable feedback.";

pub fn system_for(target: ExtractionTarget) -> &'static str {
    match target {
        ExtractionTarget::Entities(_) => EXTRACTION_SYSTEM,
        ExtractionTarget::Relationships => RELATIONSHIP_SYSTEM,
    }
}

pub fn build_extraction_prompt(target: ExtractionTarget, chunk_text: &str) -> String {
    match target {
        ExtractionTarget::Entities(entity_type) => build_entity_prompt(entity_type, chunk_text),
        ExtractionTarget::Relationships => build_relationship_prompt(chunk_text),
    }
}

fn entity_schema(entity_type: EntityType) -> (&'static str, &'static str) {
    match entity_type {
        EntityType::Event => (
            "Title (required), year (required), description, type (Publication, Conference, Policy, Research, Movement, Organization, Other), significance (1-5), start/end dates, associated locations, key actors, related concepts",
            r#"{"title": "Event title", "year": 1992, "description": "Detailed description", "type": "Event type", "significance": 4, "dates": {"start": "YYYY-MM-DD", "end": "YYYY-MM-DD"}, "locations": ["Location names"], "actors": ["Actor names"], "concepts": ["Concept names"], "supporting_text": "Exact excerpt"}"#,
        ),
        EntityType::Actor => (
            "Name (required), type (Individual, Institution, Government, NGO, Coalition, Other), description, role in planetary health, country, areas of expertise, affiliations",
            r#"{"name": "Actor name", "type": "Actor type", "description": "Description of the actor", "role": "Role in planetary health", "country": "Country", "expertise": ["Field"], "affiliations": ["Organization"], "supporting_text": "Exact excerpt"}"#,
        ),
        EntityType::Concept => (
            "Name (required), definition, alternative names, domains, significance (1-5), related concepts, key proponents",
            r#"{"name": "Concept name", "definition": "Definition", "alternative_names": ["Synonym"], "domain": ["Field"], "significance": 3, "related_concepts": ["Concept"], "key_proponents": ["Proponent"], "supporting_text": "Exact excerpt"}"#,
        ),
        EntityType::Publication => (
            "Title (required), type, year, authors, publisher or journal, identifier (DOI/ISBN), abstract, significance (1-5)",
            r#"{"title": "Publication title", "type": "Publication type", "year": 2015, "authors": ["Author"], "publisher": "Publisher or journal", "identifier": "DOI or ISBN", "abstract": "Brief summary", "significance": 3, "supporting_text": "Exact excerpt"}"#,
        ),
        EntityType::Location => (
            "Name (required), type (Country, City, Region, Ecosystem, Other), country, description, why it matters to planetary health",
            r#"{"name": "Location name", "type": "Location type", "country": "Country", "description": "Context", "significance": "Why this location matters", "supporting_text": "Exact excerpt"}"#,
        ),
    }
}

fn build_entity_prompt(entity_type: EntityType, chunk_text: &str) -> String {
    let (fields, example) = entity_schema(entity_type);
    let upper = entity_type.plural().to_uppercase();

    format!(
        r#"Analyze the following text from a document about planetary health and identify any {upper} mentioned.

For each item, extract: {fields}.
Always include "supporting_text": the exact excerpt from the text that supports the extraction.

Text to analyze:
{chunk_text}

Respond with ONLY a JSON object of this shape:
{{"{key}": [{example}]}}"#,
        key = entity_type.plural(),
    )
}

fn build_relationship_prompt(chunk_text: &str) -> String {
    format!(
        r#"Analyze the following text and identify relationships between entities in the planetary health domain.
Focus on these relationship types:
- Event influences Event
- Actor participates in Event
- Event introduces Concept
- Publication cites Publication
- Actor develops Concept
- Actor collaborates with Actor
- Concept relates to Concept
- Event takes place at Location

For each relationship, include the supporting text that evidences it.

Text to analyze:
{chunk_text}

Respond with ONLY a JSON object of this shape:
{{
  "relationships": [
    {{
      "source": "Source entity name",
      "source_type": "Event|Actor|Concept|Publication|Location",
      "target": "Target entity name",
      "target_type": "Event|Actor|Concept|Publication|Location",
      "relationship_type": "Influences|Participates|Develops|etc.",
      "description": "Description of the relationship",
      "strength": 3,
      "supporting_text": "The exact text excerpt that supports this relationship"
    }}
  ]
}}"#
    )
}

fn entity_criteria(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Event => {
            "- Is the event title descriptive and accurate?\n- Is the year plausible and consistent with the description?\n- Is the event type classification appropriate?\n- Is the significance rating (1-5) reasonable?\n- Are associated locations, actors, and concepts relevant?"
        }
        EntityType::Actor => {
            "- Is the actor name correctly identified?\n- Is the actor type accurate?\n- Is the role in planetary health clearly defined?\n- Are the expertise fields relevant?\n- Is the country information accurate?"
        }
        EntityType::Concept => {
            "- Is the concept name clear and standard in the field?\n- Is the definition accurate and complete?\n- Are alternative names correctly identified?\n- Is the domain classification appropriate?\n- Are related concepts actually related?"
        }
        EntityType::Publication => {
            "- Is the title accurate and complete?\n- Is the publication type correctly classified?\n- Are the authors correctly identified?\n- Is the year plausible?\n- Is the publisher/journal information accurate?"
        }
        EntityType::Location => {
            "- Is the location name correctly identified?\n- Is the location type accurate?\n- Is the country information correct?\n- Is the significance to planetary health clearly explained?"
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

pub fn build_critique_prompt(request: &CritiqueRequest) -> String {
    match &request.subject {
        CritiqueSubject::Entity {
            entity_type,
            record,
        } => {
            let upper = entity_type.as_str().to_uppercase();
            format!(
                r#"You are an expert reviewer of entity extraction for a planetary health knowledge graph.

EXTRACTED {upper}:
{record}

ORIGINAL TEXT CONTEXT:
{context}

SUPPORTING TEXT:
{supporting}

Score this {kind} extraction from 1 to 5 on evidence, accuracy, completeness, relevance, supporting text quality and consistency.
Type-specific checks:
{criteria}

Respond with ONLY a JSON object of this shape:
{{
  "evaluation": {{
    "evidence_score": 1, "accuracy_score": 1, "completeness_score": 1,
    "relevance_score": 1, "supporting_text_score": 1, "consistency_score": 1,
    "overall_confidence": 1,
    "extraction_quality": "excellent|good|fair|poor",
    "issues_identified": [
      {{"issue_type": "evidence|accuracy|completeness|relevance|supporting_text|consistency", "description": "...", "severity": 1, "suggested_correction": "..."}}
    ],
    "strengths": ["..."],
    "human_review_recommended": true,
    "human_review_reason": "...",
    "confidence_explanation": "..."
  }}
}}"#,
                record = pretty(record),
                context = request.chunk_preview,
                supporting = request.supporting_text,
                kind = entity_type,
                criteria = entity_criteria(*entity_type),
            )
        }
        CritiqueSubject::Relationship {
            record,
            source,
            target,
        } => {
            let describe = |label: &str, entity: &Option<Value>| match entity {
                Some(e) => format!("{label} Entity: {}", pretty(e)),
                None => format!("{label} Entity: Not found"),
            };
            format!(
                r#"You are an expert reviewer of relationship extraction for a planetary health knowledge graph.

EXTRACTED RELATIONSHIP:
{record}

{source}

{target}

ORIGINAL TEXT CONTEXT:
{context}

Score this relationship from 1 to 5 on evidence, entity accuracy, relationship type, direction, strength rating, relevance and entity existence.

Respond with ONLY a JSON object of this shape:
{{
  "evaluation": {{
    "evidence_score": 1, "entity_accuracy_score": 1, "relationship_type_score": 1,
    "direction_score": 1, "strength_score": 1, "relevance_score": 1,
    "entity_existence_score": 1,
    "overall_confidence": 1,
    "extraction_quality": "excellent|good|fair|poor",
    "issues_identified": [
      {{"issue_type": "evidence|entity_accuracy|relationship_type|direction|strength|relevance|entity_existence", "description": "...", "severity": 1, "suggested_correction": "..."}}
    ],
    "strengths": ["..."],
    "human_review_recommended": true,
    "human_review_reason": "...",
    "confidence_explanation": "..."
  }}
}}"#,
                record = pretty(record),
                source = describe("Source", source),
                target = describe("Target", target),
                context = request.chunk_preview,
            )
        }
    }
}
