//! End-to-end tests: indexing, querying and agents over the offline providers.

#[cfg(test)]
mod tests {
    use crate::agent::{builtin_agent_registry, Agent, AgentResources, PipelineAgent, ToolAgent, MULTIMODAL_RAG_AGENT};
    use crate::components::{builtin_registry, SplitterOptions, TextSplitter};
    use crate::config::RagConfig;
    use crate::context::{ContextValue, RunContext};
    use crate::core::RetrievedChunk;
    use crate::errors::AgentError;
    use crate::pipeline::{create_pipeline, IndexingSummary, Pipeline, PipelineKind, QuerySummary};
    use crate::providers::{ModelReply, ToolCallRequest};
    use crate::store::VectorStore;
    use crate::testing::{test_ports, write_text_fixtures, ScriptedLanguageModel};
    use crate::tools::{default_tools, multimodal_query_tool, rag_tools, ToolRegistry};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::Path;
    use std::sync::Arc;

    const SATURN: &str = "Saturn is the sixth planet from the Sun. Its rings are made of ice and rock.";
    const MARS: &str = "Mars is called the red planet. Iron oxide dust covers its surface.";
    const VENUS: &str = "Venus has a thick atmosphere of carbon dioxide. It is the hottest planet.";

    struct Rag {
        store: Arc<dyn VectorStore>,
        indexing: Arc<Pipeline>,
        query: Arc<Pipeline>,
    }

    fn rag() -> Rag {
        rag_with(&RagConfig::default())
    }

    fn rag_with(config: &RagConfig) -> Rag {
        let ports = test_ports();
        let store = ports.store.clone().unwrap();
        let registry = builtin_registry(&ports).unwrap();
        Rag {
            store,
            indexing: Arc::new(create_pipeline(PipelineKind::Indexing, config, &registry).unwrap()),
            query: Arc::new(create_pipeline(PipelineKind::Query, config, &registry).unwrap()),
        }
    }

    async fn index(rag: &Rag, dir: &Path, clear: bool) -> IndexingSummary {
        let ctx = RunContext::new()
            .with("directory_path", dir.display().to_string())
            .with("clear_vectorstore", clear);
        let run = rag.indexing.run(ctx).await.unwrap();
        IndexingSummary::from_context(&run.context)
    }

    async fn ask(rag: &Rag, query: &str) -> RunContext {
        rag.query.run(RunContext::new().with("query", query)).await.unwrap().into_context()
    }

    fn retrieved(ctx: &RunContext) -> Vec<RetrievedChunk> {
        match ctx.get("documents") {
            Some(ContextValue::Retrieved(results)) => results.clone(),
            other => panic!("unexpected documents value: {other:?}"),
        }
    }

    fn planets(dir: &Path) {
        write_text_fixtures(dir, &[("saturn.txt", SATURN), ("mars.txt", MARS), ("venus.md", VENUS)]).unwrap();
    }

    #[tokio::test]
    async fn test_index_then_query() {
        let dir = tempfile::tempdir().unwrap();
        planets(dir.path());
        let rag = rag();

        let summary = index(&rag, dir.path(), true).await;
        assert_eq!(summary.documents_loaded, 3);
        assert_eq!(summary.chunks_indexed, 3);
        assert_eq!(summary.store_total, 3);
        assert_eq!(rag.store.count().await.unwrap(), 3);

        let ctx = ask(&rag, "What are the rings of Saturn made of?").await;
        let response = ctx.text("response").unwrap();
        assert!(!response.trim().is_empty());

        let results = retrieved(&ctx);
        assert_eq!(results.len(), 3);
        let root = dir.path().display().to_string();
        for r in &results {
            assert!(r.chunk.source().unwrap().starts_with(&root));
        }
        let ranks: Vec<usize> = results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![0, 1, 2]);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    fn paragraph(topic: &str, facts: &[&str]) -> String {
        facts
            .iter()
            .map(|fact| format!("{topic} {fact}."))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[tokio::test]
    async fn test_store_holds_exactly_the_split_chunks() {
        let saturn = paragraph(
            "Saturn",
            &[
                "is the sixth planet from the Sun",
                "has rings made mostly of water ice",
                "has a moon called Titan with a thick atmosphere",
                "is a gas giant with a very low density",
                "takes about twenty nine years to orbit the Sun",
                "was visited by the Cassini spacecraft",
            ],
        );
        let mars = paragraph(
            "Mars",
            &[
                "is called the red planet",
                "has iron oxide dust covering its surface",
                "hosts Olympus Mons, the tallest volcano known",
                "has two small moons named Phobos and Deimos",
                "has polar caps of water and carbon dioxide ice",
            ],
        );
        let venus = format!(
            "# Venus\n\n{}\n\n## Surface\n\n{}",
            paragraph("Venus", &["has a thick carbon dioxide atmosphere", "is the hottest planet"]),
            paragraph("Venus", &["has a surface shaped by volcanism", "rotates backwards very slowly"]),
        );
        let dir = tempfile::tempdir().unwrap();
        write_text_fixtures(
            dir.path(),
            &[("saturn.txt", saturn.as_str()), ("mars.txt", mars.as_str()), ("venus.md", venus.as_str())],
        )
        .unwrap();

        let mut config = RagConfig::default();
        config.retrieval.chunk_size = 120;
        config.retrieval.chunk_overlap = 20;
        config.retrieval.min_chunk_length = 20;
        let rag = rag_with(&config);

        let ctx = RunContext::new()
            .with("directory_path", dir.path().display().to_string())
            .with("clear_vectorstore", true);
        let run = rag.indexing.run(ctx).await.unwrap();

        let splitter = TextSplitter::new(
            "expected",
            SplitterOptions {
                chunk_size: 120,
                chunk_overlap: 20,
                min_chunk_length: 20,
                ..Default::default()
            },
        )
        .unwrap();
        let cleaned = run.context.require_documents("test", "processed_documents").unwrap();
        assert_eq!(cleaned.len(), 3);
        let expected: usize = cleaned.iter().map(|doc| splitter.split_document(doc).len()).sum();

        assert!(expected > 3);
        assert_eq!(IndexingSummary::from_context(&run.context).chunks_indexed, expected);
        assert_eq!(rag.store.count().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_reindexing_upserts_or_clears() {
        let dir = tempfile::tempdir().unwrap();
        planets(dir.path());
        let rag = rag();

        index(&rag, dir.path(), false).await;
        let again = index(&rag, dir.path(), false).await;
        assert_eq!(again.store_total, 3);

        let cleared = index(&rag, dir.path(), true).await;
        assert_eq!(cleared.chunks_indexed, 3);
        assert_eq!(cleared.store_total, 3);
    }

    #[tokio::test]
    async fn test_k_larger_than_store() {
        let dir = tempfile::tempdir().unwrap();
        write_text_fixtures(dir.path(), &[("saturn.txt", SATURN), ("mars.txt", MARS)]).unwrap();
        let rag = rag();
        index(&rag, dir.path(), true).await;

        let ctx = ask(&rag, "Which planet is red?").await;

        assert_eq!(retrieved(&ctx).len(), 2);
        assert_eq!(QuerySummary::from_context(&ctx).retrieved, 2);
    }

    #[tokio::test]
    async fn test_same_inputs_same_answer() {
        let dir = tempfile::tempdir().unwrap();
        planets(dir.path());

        let mut answers = Vec::new();
        for _ in 0..2 {
            let rag = rag();
            index(&rag, dir.path(), true).await;
            let ctx = ask(&rag, "Which planet is the hottest?").await;
            answers.push((
                ctx.text("response").map(str::to_string),
                QuerySummary::from_context(&ctx).top_sources,
                ctx.get("retrieval_scores").cloned(),
            ));
        }

        assert_eq!(answers[0], answers[1]);
    }

    #[tokio::test]
    async fn test_equal_scores_keep_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        write_text_fixtures(dir.path(), &[("b.txt", SATURN), ("a.txt", SATURN)]).unwrap();
        let rag = rag();
        index(&rag, dir.path(), true).await;

        let results = retrieved(&ask(&rag, "Saturn rings").await);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].score, results[1].score);
        assert!(results[0].chunk.source().unwrap().ends_with("a.txt"));
        assert!(results[1].chunk.source().unwrap().ends_with("b.txt"));
    }

    #[tokio::test]
    async fn test_pipeline_agent_over_query_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        planets(dir.path());
        let rag = rag();
        index(&rag, dir.path(), true).await;

        let mut agent = PipelineAgent::new(rag.query.clone()).with_top_k(1);
        let answer = agent.ask("Which dust covers the surface of Mars?").await.unwrap();

        assert!(answer.contains("Iron oxide"));
        assert_eq!(agent.session().last_response(), Some(answer.as_str()));
    }

    #[tokio::test]
    async fn test_tool_agent_uses_rag_tools() {
        let dir = tempfile::tempdir().unwrap();
        planets(dir.path());
        let rag = rag();

        let mut tools: Vec<_> = rag_tools(rag.query.clone(), rag.indexing.clone(), rag.store.clone());
        tools.extend(default_tools());
        let registry = Arc::new(ToolRegistry::with_tools(tools).unwrap());

        let llm = Arc::new(ScriptedLanguageModel::new([
            ModelReply::tool_calls(vec![ToolCallRequest::new(
                "c1",
                "index_directory",
                json!({"directory_path": dir.path().display().to_string(), "clear_vectorstore": true}),
            )]),
            ModelReply::tool_calls(vec![
                ToolCallRequest::new("c2", "rag_query", json!({"query": "Which planet is red?", "k": 1})),
                ToolCallRequest::new("c3", "vectorstore_info", json!({})),
            ]),
            ModelReply::text("Mars."),
        ]));
        let mut agent = ToolAgent::new(llm, registry);

        let answer = agent.ask("Index my notes, then tell me which planet is red.").await.unwrap();

        assert_eq!(answer, "Mars.");
        let trace = agent.trace();
        assert_eq!(trace.len(), 3);
        assert_eq!(trace[0].output["chunks_indexed"], json!(3));
        assert_eq!(trace[1].round, 2);
        assert_eq!(trace[1].output["retrieved"], json!(1));
        assert!(trace[1].output["response"].as_str().unwrap().contains("red planet"));
        assert_eq!(trace[2].output["chunk_count"], json!(3));
    }

    #[tokio::test]
    async fn test_tool_agent_calculator_round() {
        let registry = Arc::new(ToolRegistry::with_tools(default_tools()).unwrap());
        let llm = Arc::new(ScriptedLanguageModel::new([
            ModelReply::tool_calls(vec![ToolCallRequest::new("c1", "calculate", json!({"expression": "(2 + 3) * 4"}))]),
            ModelReply::text("20"),
        ]));
        let mut agent = ToolAgent::new(llm.clone(), registry);

        assert_eq!(agent.ask("What is (2 + 3) * 4?").await.unwrap(), "20");
        assert_eq!(agent.trace()[0].output, json!({"expression": "(2 + 3) * 4", "result": 20}));
        assert_eq!(llm.remaining(), 0);
    }

    #[tokio::test]
    async fn test_tool_agent_failures_leave_consistent_history() {
        let registry = Arc::new(ToolRegistry::with_tools(default_tools()).unwrap());
        let llm = Arc::new(ScriptedLanguageModel::new([ModelReply::tool_calls(vec![ToolCallRequest::new(
            "c1",
            "web_search",
            json!({"query": "x"}),
        )])]));
        let mut agent = ToolAgent::new(llm, registry);

        let err = agent.ask("search the web").await.unwrap_err();

        assert_eq!(err.to_string(), "unknown tool 'web_search'");
        assert!(matches!(err, AgentError::UnknownTool(_)));
        assert_eq!(agent.session().len(), 1);
    }

    async fn multimodal_rag(dir: &Path) -> Arc<Pipeline> {
        write_text_fixtures(
            dir,
            &[
                ("chart.png", "PNGDATA"),
                ("chart.png.ocr.txt", "Quarterly revenue grew by ten percent."),
                ("saturn.txt", SATURN),
            ],
        )
        .unwrap();
        let ports = test_ports();
        let registry = builtin_registry(&ports).unwrap();
        let config = RagConfig::default();
        let indexing = create_pipeline(PipelineKind::MultimodalIndexing, &config, &registry).unwrap();
        let ctx = RunContext::new()
            .with("directory_path", dir.display().to_string())
            .with("clear_vectorstore", true);
        let summary = IndexingSummary::from_context(&indexing.run(ctx).await.unwrap().context);
        assert_eq!(summary.multimodal_documents, 1);
        Arc::new(create_pipeline(PipelineKind::MultimodalQuery, &config, &registry).unwrap())
    }

    #[tokio::test]
    async fn test_multimodal_query_tool_finds_the_image() {
        let dir = tempfile::tempdir().unwrap();
        let query = multimodal_rag(dir.path()).await;

        let out = multimodal_query_tool(query)
            .invoke(&json!({
                "query": "What does this show?",
                "image_urls": ["https://example.com/uploads/chart.png"],
                "k": 1,
            }))
            .await
            .unwrap();

        assert_eq!(out["retrieved"], json!(1));
        assert!(out["sources"][0].as_str().unwrap().ends_with("chart.png"));
    }

    #[tokio::test]
    async fn test_multimodal_agent_forwards_image_urls() {
        let dir = tempfile::tempdir().unwrap();
        let query = multimodal_rag(dir.path()).await;
        let llm = Arc::new(ScriptedLanguageModel::new([
            ModelReply::tool_calls(vec![ToolCallRequest::new(
                "c1",
                "multimodal_query",
                json!({"query": "What does this show?", "image_urls": ["chart.png"], "k": 1}),
            )]),
            ModelReply::text("Revenue grew."),
        ]));
        let resources = AgentResources::new(RagConfig::default())
            .with_llm(llm.clone())
            .with_query_pipeline(query);
        let mut agent = builtin_agent_registry()
            .unwrap()
            .create(MULTIMODAL_RAG_AGENT, &resources)
            .unwrap();

        assert_eq!(agent.ask("What does chart.png show?").await.unwrap(), "Revenue grew.");
        assert!(agent.trace()[0].output["sources"][0].as_str().unwrap().ends_with("chart.png"));
        assert!(llm.requests()[0]
            .tools
            .iter()
            .any(|t| t["function"]["name"] == json!("multimodal_query")));
    }

    #[tokio::test]
    async fn test_ask_with_images_sends_query_and_urls() {
        let llm = Arc::new(ScriptedLanguageModel::new([ModelReply::text("A bar chart.")]));
        let mut agent = ToolAgent::new(llm.clone(), Arc::new(ToolRegistry::new()));

        let answer = agent
            .ask_with_images("What is this?", &["https://example.com/chart.png".to_string()])
            .await
            .unwrap();

        assert_eq!(answer, "A bar chart.");
        let sent: serde_json::Value = serde_json::from_str(&llm.requests()[0].messages[0].content).unwrap();
        assert_eq!(sent, json!({"query": "What is this?", "image_urls": ["https://example.com/chart.png"]}));
    }
}
