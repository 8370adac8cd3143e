/// Find evidence for an entity in its chunk when the model gave none.
///
/// Takes up to two sentences that share at least two significant words with
/// the name (or mention the year); otherwise the opening of the chunk.
pub fn find_supporting_text(name: &str, year: Option<&str>, chunk_text: &str) -> String {
    let name = name.to_lowercase();
    let name_words: Vec<&str> = name.split_whitespace().collect();
    let year = year.filter(|y| !y.is_empty());

    let mut supporting = Vec::new();
    for sentence in chunk_text.split(". ") {
        let lower = sentence.to_lowercase();
        let mentions_year = year.is_some_and(|y| sentence.contains(y));

        let supports = match name_words.as_slice() {
            [] => false,
            [single] => single.len() > 3 && lower.contains(single) && mentions_year,
            words => {
                let matches = words
                    .iter()
                    .filter(|w| w.len() > 3 && lower.contains(*w))
                    .count();
                matches >= 2 || mentions_year
            }
        };

        if supports {
            supporting.push(sentence.trim());
            if supporting.len() == 2 {
                break;
            }
        }
    }

    if supporting.is_empty() {
        let opening: String = chunk_text.chars().take(200).collect();
        return format!("{opening}...");
    }

    format!("{}.", supporting.join(". ").trim_end_matches('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "The Rockefeller Foundation launched the Lancet Commission in 2015. \
        It coined planetary health as a field. The commission report was widely cited";

    #[test]
    fn picks_sentences_sharing_name_words() {
        let found = find_supporting_text("Rockefeller Foundation Commission", None, TEXT);
        assert_eq!(found, "The Rockefeller Foundation launched the Lancet Commission in 2015.");
    }

    #[test]
    fn single_word_names_need_the_year() {
        let found = find_supporting_text("Lancet", Some("2015"), TEXT);
        assert!(found.starts_with("The Rockefeller Foundation"));

        let missing = find_supporting_text("Lancet", None, TEXT);
        assert!(missing.ends_with("..."));
    }
}
