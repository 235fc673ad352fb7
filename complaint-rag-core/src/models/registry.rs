use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatModel {
    pub id: String,
    pub name: String,
    pub context_length: usize,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingModel {
    pub id: String,
    pub name: String,
    pub context_length: usize,
    pub embedding_dim: usize,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Model {
    Chat(ChatModel),
    Embedding(EmbeddingModel),
}

impl Model {
    pub fn id(&self) -> &str {
        match self {
            Model::Chat(m) => &m.id,
            Model::Embedding(m) => &m.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Model::Chat(m) => &m.name,
            Model::Embedding(m) => &m.name,
        }
    }

    pub fn context_length(&self) -> usize {
        match self {
            Model::Chat(m) => m.context_length,
            Model::Embedding(m) => m.context_length,
        }
    }
}

/// Models with known shapes, keyed by their backend identifier.
pub struct ModelRegistry {
    models: Vec<Model>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            models: default_models(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.id() == id)
    }

    pub fn get_embedding(&self, id: &str) -> Option<&EmbeddingModel> {
        self.get(id).and_then(|m| match m {
            Model::Embedding(embed) => Some(embed),
            _ => None,
        })
    }

    pub fn get_chat(&self, id: &str) -> Option<&ChatModel> {
        self.get(id).and_then(|m| match m {
            Model::Chat(chat) => Some(chat),
            _ => None,
        })
    }

    pub fn embedding_models(&self) -> impl Iterator<Item = &EmbeddingModel> {
        self.models.iter().filter_map(|m| match m {
            Model::Embedding(embed) => Some(embed),
            _ => None,
        })
    }

    pub fn all_models(&self) -> &[Model] {
        &self.models
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn default_models() -> Vec<Model> {
    vec![
        Model::Chat(ChatModel {
            id: "falcon:7b-instruct".to_string(),
            name: "Falcon 7B Instruct".to_string(),
            context_length: 2048,
            description: "Instruction-tuned model used for grounded complaint answers".to_string(),
        }),
        Model::Chat(ChatModel {
            id: "llama3.2:3b".to_string(),
            name: "Llama 3.2 3B".to_string(),
            context_length: 131072,
            description: "Small general-purpose instruction model".to_string(),
        }),
        Model::Embedding(EmbeddingModel {
            id: "all-minilm".to_string(),
            name: "all-MiniLM-L6-v2".to_string(),
            context_length: 256,
            embedding_dim: 384,
            description: "Compact sentence embedding model".to_string(),
        }),
        Model::Embedding(EmbeddingModel {
            id: "nomic-embed-text".to_string(),
            name: "Nomic Embed Text".to_string(),
            context_length: 8192,
            embedding_dim: 768,
            description: "General purpose long-context embeddings".to_string(),
        }),
        Model::Embedding(EmbeddingModel {
            id: "mxbai-embed-large".to_string(),
            name: "mxbai-embed-large".to_string(),
            context_length: 512,
            embedding_dim: 1024,
            description: "Higher quality, larger embeddings".to_string(),
        }),
    ]
}
