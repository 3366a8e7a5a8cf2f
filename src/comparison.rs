//! Ranking of stored contracts against a user's needs, delegated to the model.
use crate::contract_store::ContractStore;
use crate::errors::{AppError, ResultExt};
use crate::gemini_client::{GeminiClient, Part};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

static PERCENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]+(?:[.,][0-9]+)?)\s*%").expect("valid percent pattern"));

/// One row of the model's ranking table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedContract {
    pub contract: String,
    /// Match percentage when the cell holds a readable number.
    pub match_percentage: Option<f64>,
    pub strengths: String,
    pub weaknesses: String,
}

pub fn build_ranking_prompt(user_data: &Value, contracts: &Value) -> Result<String, AppError> {
    let needs = serde_json::to_string_pretty(user_data)?;
    let available = serde_json::to_string_pretty(contracts)?;

    Ok(format!(
        r#"
Bonjour ! Vous allez analyser attentivement une liste de contrats afin de recommander **les 10 meilleurs** en fonction de leur adéquation avec les **besoins précis de l'utilisateur**.

Prenez **tout le temps nécessaire** pour effectuer une évaluation **rigoureuse, complète et méthodique**. La précision doit être **absolue (100%)** : chaque correspondance ou écart entre les besoins et les garanties doit être justifié avec soin.

Voici les informations à prendre en compte :

Besoins de l'utilisateur :
{needs}

Contrats disponibles :
{available}

**Instructions spécifiques de sélection :**

1. Pour les **3 premiers contrats**, vous devez impérativement privilégier ceux qui **couvrent intégralement l'ensemble des besoins exprimés par l'utilisateur**.
2. Pour les **7 contrats suivants**, sélectionnez ceux qui **se rapprochent le plus des besoins**, même s'ils ne les couvrent pas entièrement.
3. Classez l'ensemble des 10 contrats dans l'ordre décroissant de pertinence, en commençant par le plus adapté.

Votre mission est d'identifier les **10 contrats les plus pertinents** et de les présenter sous forme de **tableau Markdown**, selon le format suivant :

| Contrat | Pourcentage de correspondance | Points forts | Points faibles |
|--------|-------------------------------|--------------|----------------|

Pour chaque contrat sélectionné, vous devez :

1. Indiquer **le nom exact du contrat**.
2. Fournir un **"Pourcentage de correspondance"** (de 0 % à 100 %) qui reflète **l'adéquation globale** entre le contrat et les besoins exprimés.
3. Lister précisément les **"Points forts"** : les garanties qui **répondent ou surpassent les attentes** de l'utilisateur.
4. Identifier clairement les **"Points faibles"** : les garanties **insuffisantes, absentes ou inadaptées** par rapport aux besoins.

⚠️ Veuillez **retourner uniquement le tableau Markdown**, sans texte, commentaire ou formatage supplémentaire.

Soyez **exhaustif, objectif et précis au maximum**.
"#
    ))
}

/// Reads the rows of a 4-column markdown ranking table.
///
/// Header and separator rows are skipped, as are rows with fewer than four cells.
pub fn parse_ranking_table(markdown: &str) -> Vec<RankedContract> {
    markdown
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('|'))
        .filter_map(|line| {
            let cells: Vec<&str> = line
                .trim_matches('|')
                .split('|')
                .map(str::trim)
                .collect();

            if cells.len() < 4 || is_separator_row(&cells) || is_header_row(&cells) {
                return None;
            }

            Some(RankedContract {
                contract: cells[0].to_string(),
                match_percentage: parse_percentage(cells[1]),
                strengths: cells[2].to_string(),
                weaknesses: cells[3].to_string(),
            })
        })
        .collect()
}

fn is_separator_row(cells: &[&str]) -> bool {
    cells
        .iter()
        .all(|cell| !cell.is_empty() && cell.chars().all(|c| matches!(c, '-' | ':' | ' ')))
}

fn is_header_row(cells: &[&str]) -> bool {
    cells[0].trim_matches('*').eq_ignore_ascii_case("contrat")
}

fn parse_percentage(cell: &str) -> Option<f64> {
    PERCENT
        .captures(cell)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().replace(',', ".").parse().ok())
}

pub struct ComparisonService {
    client: GeminiClient,
    store: Arc<ContractStore>,
}

impl ComparisonService {
    pub fn new(client: GeminiClient, store: Arc<ContractStore>) -> Self {
        Self { client, store }
    }

    /// Asks the model for the best-matching contracts.
    ///
    /// # Returns
    ///
    /// * `Result<String, AppError>` - The markdown ranking table.
    pub async fn find_top_contracts(&self, user_data: &Value) -> Result<String, AppError> {
        tracing::info!("Comparing contracts against user needs");
        tracing::debug!("User data received: {}", user_data);

        let contracts = self
            .store
            .list()
            .await
            .context("Loading contracts for comparison")?;

        let prompt = build_ranking_prompt(user_data, &contracts)?;
        let table = self.client.generate_content(&[Part::text(prompt)]).await?;

        tracing::debug!(
            "Model response (first 500 chars): {}",
            table.chars().take(500).collect::<String>()
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TABLE: &str = "\
| Contrat | Pourcentage de correspondance | Points forts | Points faibles |
|--------|-------------------------------|--------------|----------------|
| Santé Plus - Niveau 3 | 95 % | Hospitalisation 300% BR | Optique faible |
| **Mutuelle Verte N2** | 72,5% | Dentaire | Chambre particulière 40€ |
| Incomplet | 10% |
";

    #[test]
    fn test_parse_ranking_table() {
        let rows = parse_ranking_table(TABLE);
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].contract, "Santé Plus - Niveau 3");
        assert_eq!(rows[0].match_percentage, Some(95.0));
        assert_eq!(rows[0].strengths, "Hospitalisation 300% BR");
        assert_eq!(rows[0].weaknesses, "Optique faible");

        assert_eq!(rows[1].contract, "**Mutuelle Verte N2**");
        assert_eq!(rows[1].match_percentage, Some(72.5));
    }

    #[test]
    fn test_parse_non_table_text() {
        assert!(parse_ranking_table("Aucun contrat disponible.").is_empty());
    }

    #[test]
    fn test_unreadable_percentage() {
        let rows = parse_ranking_table("| A | élevé | x | y |");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].match_percentage, None);
    }

    #[test]
    fn test_prompt_embeds_needs_and_contracts() {
        let prompt = build_ranking_prompt(
            &json!({ "DENTAIRE": { "implantologie": "500 €" } }),
            &json!([{ "level_id": "n1" }]),
        )
        .unwrap();
        assert!(prompt.contains("\"implantologie\": \"500 €\""));
        assert!(prompt.contains("\"level_id\": \"n1\""));
        assert!(prompt.contains("| Contrat | Pourcentage de correspondance |"));
    }
}
