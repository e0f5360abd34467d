//! Workflow tests against scripted services

#[cfg(test)]
mod workflow_tests {
    use crate::{Document, Endpoint, Error, Node, RagWorkflow, Result, State, WorkflowGraph};
    use async_trait::async_trait;
    use insta::assert_snapshot;
    use ragflow_core::{
        ChatMessage, ChatModel, GenerationConfig, GenerationResult, Retriever, SearchHit, WebSearch,
    };
    use ragflow_llm::EvaluationChains;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PASS: &str = r#"{"score": true, "relevance_score": 0.9}"#;
    const WEAK: &str = r#"{"score": true, "relevance_score": 0.5}"#;
    const IRRELEVANT: &str = r#"{"score": false, "relevance_score": 0.2}"#;
    const FAIL: &str = r#"{"score": false, "relevance_score": 0.9}"#;

    /// Replies per prompt kind; the last reply of each queue repeats forever
    struct ScriptedModel {
        retrieval: Mutex<VecDeque<&'static str>>,
        solution: Mutex<VecDeque<&'static str>>,
        question: Mutex<VecDeque<&'static str>>,
        answers: Mutex<VecDeque<&'static str>>,
    }

    impl ScriptedModel {
        fn new(
            retrieval: &[&'static str],
            solution: &[&'static str],
            question: &[&'static str],
        ) -> Self {
            Self {
                retrieval: Mutex::new(retrieval.iter().copied().collect()),
                solution: Mutex::new(solution.iter().copied().collect()),
                question: Mutex::new(question.iter().copied().collect()),
                answers: Mutex::new(VecDeque::from(["Memory cells keep immunity going."])),
            }
        }

        fn next(queue: &Mutex<VecDeque<&'static str>>) -> Result<String> {
            let mut queue = queue.lock().unwrap();
            let reply = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().copied()
            };
            reply
                .map(str::to_string)
                .ok_or_else(|| Error::LLMProvider("no scripted reply".to_string()))
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            _config: &GenerationConfig,
        ) -> Result<GenerationResult> {
            let system = &messages[0].content;
            let queue = if system.contains("relevance of a retrieved document") {
                &self.retrieval
            } else if system.contains("grounded in and supported") {
                &self.solution
            } else if system.contains("addresses and resolves") {
                &self.question
            } else {
                &self.answers
            };

            Ok(GenerationResult {
                text: Self::next(queue)?,
                model_id: "scripted".to_string(),
                tokens_used: None,
            })
        }

        fn model_id(&self) -> &str {
            "scripted"
        }
    }

    /// Returns fixed documents, or fails when none are configured
    struct StaticRetriever(Option<Vec<Document>>);

    #[async_trait]
    impl Retriever for StaticRetriever {
        async fn retrieve(&self, _query: &str) -> Result<Vec<Document>> {
            self.0
                .clone()
                .ok_or_else(|| Error::VectorStore("connection refused".to_string()))
        }
    }

    struct StaticSearch {
        hits: Option<Vec<SearchHit>>,
        calls: AtomicUsize,
    }

    impl StaticSearch {
        fn new(hits: Option<Vec<SearchHit>>) -> Self {
            Self {
                hits,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl WebSearch for StaticSearch {
        async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let hits = self
                .hits
                .clone()
                .ok_or_else(|| Error::WebSearch("rate limited".to_string()))?;
            Ok(hits.into_iter().take(max_results).collect())
        }
    }

    fn stored_docs() -> Vec<Document> {
        vec![
            Document::new("Vaccines induce memory B cells.")
                .with_metadata(serde_json::json!({"source": "vector_store"})),
            Document::new("Booster doses restore antibody levels.")
                .with_metadata(serde_json::json!({"source": "vector_store"})),
        ]
    }

    fn web_hits() -> Vec<SearchHit> {
        vec![SearchHit {
            title: "Immunity".to_string(),
            href: "https://example.org/immunity".to_string(),
            body: "  Immunity can last for decades.  ".to_string(),
        }]
    }

    fn workflow(
        docs: Option<Vec<Document>>,
        hits: Option<Vec<SearchHit>>,
        model: ScriptedModel,
    ) -> RagWorkflow<StaticRetriever, ScriptedModel, StaticSearch> {
        RagWorkflow::new(
            StaticRetriever(docs),
            EvaluationChains::new(model),
            StaticSearch::new(hits),
        )
    }

    const QUESTION: &str = "How long does vaccine immunity last?";

    #[tokio::test]
    async fn test_answers_from_relevant_documents() {
        let flow = workflow(
            Some(stored_docs()),
            Some(web_hits()),
            ScriptedModel::new(&[PASS], &[PASS], &[PASS]),
        );

        let state = flow.invoke(QUESTION).await.unwrap();

        assert_eq!(
            state.trace,
            vec![Node::RetrieveDocuments, Node::EvaluateDocuments, Node::GenerateAnswer]
        );
        assert!(!state.web_search);
        assert_eq!(state.documents.len(), 2);
        assert_eq!(state.document_evaluations.len(), 2);
        assert_eq!(state.solution.as_deref(), Some("Memory cells keep immunity going."));
        assert_eq!(state.solution_evaluation, Some(0.9));
        assert_eq!(state.question_evaluation, Some(0.9));
        assert!(!state.searched_online());
    }

    #[tokio::test]
    async fn test_searches_online_when_documents_are_weak() {
        let flow = workflow(
            Some(stored_docs()),
            Some(web_hits()),
            ScriptedModel::new(&[PASS, IRRELEVANT], &[PASS], &[PASS]),
        );

        let state = flow.invoke(QUESTION).await.unwrap();

        assert_eq!(
            state.trace,
            vec![
                Node::RetrieveDocuments,
                Node::EvaluateDocuments,
                Node::SearchOnline,
                Node::GenerateAnswer
            ]
        );
        assert!(state.web_search);
        let contents: Vec<&str> = state.documents.iter().map(|d| d.page_content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["Vaccines induce memory B cells.", "Immunity can last for decades."]
        );
        assert_eq!(state.documents[1].source(), Some("web"));
    }

    #[tokio::test]
    async fn test_relevance_threshold_is_inclusive() {
        let flow = workflow(
            Some(stored_docs()),
            Some(web_hits()),
            ScriptedModel::new(
                &[r#"{"score": true, "relevance_score": 0.75}"#],
                &[PASS],
                &[PASS],
            ),
        );

        let state = flow.invoke(QUESTION).await.unwrap();
        assert!(!state.web_search);
        assert_eq!(state.documents.len(), 2);
    }

    #[tokio::test]
    async fn test_hallucinations_loop_until_recursion_limit() {
        let flow = workflow(
            Some(stored_docs()),
            Some(web_hits()),
            ScriptedModel::new(&[PASS], &[FAIL], &[PASS]),
        );

        let err = flow.invoke(QUESTION).await.unwrap_err();
        assert!(matches!(err, Error::RecursionLimit { limit: 10 }));
        assert_snapshot!(
            err.to_string(),
            @"Recursion limit of 10 reached without hitting a stop condition"
        );
    }

    #[tokio::test]
    async fn test_hallucination_then_grounded_answer() {
        let flow = workflow(
            Some(stored_docs()),
            Some(web_hits()),
            ScriptedModel::new(&[PASS], &[FAIL, PASS], &[PASS]),
        );

        let state = flow.invoke(QUESTION).await.unwrap();
        assert_eq!(state.generations(), 2);
        assert_eq!(state.solution_evaluation, Some(0.9));
    }

    #[tokio::test]
    async fn test_unaddressed_question_searches_online() {
        let flow = workflow(
            Some(stored_docs()),
            Some(web_hits()),
            ScriptedModel::new(&[PASS], &[PASS], &[WEAK, PASS]),
        );

        let state = flow.invoke(QUESTION).await.unwrap();

        assert_eq!(
            state.trace,
            vec![
                Node::RetrieveDocuments,
                Node::EvaluateDocuments,
                Node::GenerateAnswer,
                Node::SearchOnline,
                Node::GenerateAnswer
            ]
        );
        assert_eq!(state.documents.len(), 3);
        assert_eq!(state.question_evaluation, Some(0.9));
    }

    #[tokio::test]
    async fn test_retrieval_failure_falls_back_to_web() {
        let flow = workflow(None, Some(web_hits()), ScriptedModel::new(&[PASS], &[PASS], &[PASS]));

        let state = flow.invoke(QUESTION).await.unwrap();

        assert!(state.web_search);
        assert!(state.document_evaluations.is_empty());
        assert_eq!(state.documents.len(), 1);
        assert_eq!(state.documents[0].page_content, "Immunity can last for decades.");
    }

    #[tokio::test]
    async fn test_no_documents_triggers_web_search() {
        let flow = workflow(
            Some(Vec::new()),
            Some(web_hits()),
            ScriptedModel::new(&[PASS], &[PASS], &[PASS]),
        );

        let state = flow.invoke(QUESTION).await.unwrap();
        assert!(state.web_search);
        assert!(state.searched_online());
    }

    #[tokio::test]
    async fn test_web_search_failure_keeps_documents() {
        let flow = workflow(
            Some(stored_docs()),
            None,
            ScriptedModel::new(&[PASS, IRRELEVANT], &[PASS], &[PASS]),
        );

        let state = flow.invoke(QUESTION).await.unwrap();
        assert!(state.searched_online());
        assert_eq!(state.documents.len(), 1);
        assert_eq!(state.solution.as_deref(), Some("Memory cells keep immunity going."));
    }

    #[tokio::test]
    async fn test_search_results_are_limited() {
        let mut hits = web_hits();
        hits.extend(web_hits());
        let model = ScriptedModel::new(&[PASS], &[PASS], &[PASS]);
        let flow = workflow(Some(Vec::new()), Some(hits), model).with_search_results(1);

        let state = flow.invoke(QUESTION).await.unwrap();
        assert_eq!(state.documents.len(), 1);
    }

    #[tokio::test]
    async fn test_custom_recursion_limit() {
        let flow = workflow(
            Some(stored_docs()),
            Some(web_hits()),
            ScriptedModel::new(&[PASS], &[PASS], &[PASS]),
        );

        // The happy path needs three steps
        let err = flow.invoke_with_limit(QUESTION, 2).await.unwrap_err();
        assert!(matches!(err, Error::RecursionLimit { limit: 2 }));
        assert!(flow.invoke_with_limit(QUESTION, 3).await.is_ok());
    }

    /// Every step a run takes must be an edge of the drawn graph
    fn assert_follows_graph(state: &State) {
        let graph = WorkflowGraph::rag_workflow();
        let mut from = Endpoint::Start;
        for &node in &state.trace {
            let to = Endpoint::Node(node);
            assert!(
                graph.successors(from).contains(&to),
                "{:?} -> {:?} is not an edge",
                from,
                to
            );
            from = to;
        }
        assert!(graph.successors(from).contains(&Endpoint::End));
    }

    #[tokio::test]
    async fn test_runs_follow_the_drawn_graph() {
        let scripts = [
            (Some(stored_docs()), ScriptedModel::new(&[PASS], &[PASS], &[PASS])),
            (Some(stored_docs()), ScriptedModel::new(&[PASS, IRRELEVANT], &[PASS], &[PASS])),
            (Some(stored_docs()), ScriptedModel::new(&[PASS], &[FAIL, PASS], &[PASS])),
            (Some(stored_docs()), ScriptedModel::new(&[PASS], &[PASS], &[WEAK, PASS])),
            (None, ScriptedModel::new(&[PASS], &[PASS], &[PASS])),
        ];

        for (docs, model) in scripts {
            let state = workflow(docs, Some(web_hits()), model)
                .invoke(QUESTION)
                .await
                .unwrap();
            assert_follows_graph(&state);
        }
    }

    #[tokio::test]
    async fn test_empty_question_is_rejected() {
        let flow = workflow(
            Some(stored_docs()),
            Some(web_hits()),
            ScriptedModel::new(&[PASS], &[PASS], &[PASS]),
        );

        let err = flow.invoke("   ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_state_serializes_node_names() {
        let mut state = State::new(QUESTION);
        state.trace.push(Node::RetrieveDocuments);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["trace"][0], "Retrieve Documents");
        assert_eq!(json["solution"], serde_json::Value::Null);
    }

    #[test]
    fn test_mermaid_rendering() {
        assert_snapshot!(WorkflowGraph::rag_workflow().to_mermaid(), @r"
        ---
        title: RAG Workflow
        ---
        flowchart TD
            __start__([<p>__start__</p>]):::first
            retrieve_documents(Retrieve Documents)
            evaluate_documents(Evaluate Documents)
            search_online(Search Online)
            generate_answer(Generate Answer)
            __end__([<p>__end__</p>]):::last
            __start__ --> retrieve_documents
            retrieve_documents --> evaluate_documents
            evaluate_documents -.-> search_online
            evaluate_documents -.-> generate_answer
            search_online --> generate_answer
            generate_answer -. &nbsp;Hallucinations detected&nbsp; .-> generate_answer
            generate_answer -. &nbsp;Answers Question&nbsp; .-> __end__
            generate_answer -. &nbsp;Question not addressed&nbsp; .-> search_online
            classDef default fill:#f2f0ff,line-height:1.2
            classDef first fill-opacity:0
            classDef last fill:#bfb6fc
        ");
    }
}
