use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_pipeline();
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("DOCENT_LLM_PROVIDER") {
            match v.to_ascii_lowercase().as_str() {
                "ollama" => self.llm.provider = super::ProviderKind::Ollama,
                "mock" => self.llm.provider = super::ProviderKind::Mock,
                _ => tracing::warn!("ignoring invalid DOCENT_LLM_PROVIDER value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("DOCENT_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("DOCENT_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("DOCENT_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("DOCENT_LLM_TEMPERATURE") {
            if let Ok(t) = v.parse::<f32>() {
                self.llm.temperature = t;
            } else {
                tracing::warn!("ignoring invalid DOCENT_LLM_TEMPERATURE value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DOCENT_LLM_CONTEXT_WINDOW") {
            if let Ok(n) = v.parse::<usize>() {
                self.llm.context_window = n;
            } else {
                tracing::warn!("ignoring invalid DOCENT_LLM_CONTEXT_WINDOW value: {v}");
            }
        }
    }

    fn apply_env_overrides_pipeline(&mut self) {
        if let Ok(v) = std::env::var("DOCENT_INGEST_SOURCE_DIR") {
            self.ingest.source_dir = v;
        }
        if let Ok(v) = std::env::var("DOCENT_INGEST_EXTENSION") {
            self.ingest.extension = v;
        }
        if let Ok(v) = std::env::var("DOCENT_INGEST_CHUNK_SIZE") {
            if let Ok(n) = v.parse::<usize>() {
                self.ingest.chunk_size = n;
            } else {
                tracing::warn!("ignoring invalid DOCENT_INGEST_CHUNK_SIZE value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DOCENT_INGEST_CHUNK_OVERLAP") {
            if let Ok(n) = v.parse::<usize>() {
                self.ingest.chunk_overlap = n;
            } else {
                tracing::warn!("ignoring invalid DOCENT_INGEST_CHUNK_OVERLAP value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DOCENT_INDEX_PATH") {
            self.index.path = v;
        }
        if let Ok(v) = std::env::var("DOCENT_RETRIEVAL_K") {
            if let Ok(k) = v.parse::<usize>() {
                self.retrieval.k = k;
            } else {
                tracing::warn!("ignoring invalid DOCENT_RETRIEVAL_K value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DOCENT_RETRIEVAL_SCORE_THRESHOLD") {
            if let Ok(t) = v.parse::<f32>() {
                self.retrieval.score_threshold = t;
            } else {
                tracing::warn!("ignoring invalid DOCENT_RETRIEVAL_SCORE_THRESHOLD value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DOCENT_TIMEOUT_LLM")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.llm_seconds = secs;
        }
        if let Ok(v) = std::env::var("DOCENT_TIMEOUT_EMBEDDING")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.embedding_seconds = secs;
        }
    }
}
