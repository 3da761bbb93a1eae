use super::*;
use crossbeam_channel::unbounded;
use serde_json::json;

fn conversation() -> Conversation {
    Conversation::load(None)
}

fn assistant_message(id: &str, fragments: Vec<Fragment>) -> Message {
    Message::new(id.to_string(), Role::Assistant, fragments)
}

fn user_message(id: &str, text: &str) -> Message {
    Message::new(id.to_string(), Role::User, vec![Fragment::text(text)])
}

#[test]
fn send_blank_input_is_a_no_op() {
    let mut conv = conversation();
    assert!(conv.send("").is_none());
    assert!(conv.send("   ").is_none());
    assert_eq!(conv.messages().len(), 0);
    assert_eq!(conv.status(), ChatStatus::Idle);
}

#[test]
fn send_appends_user_turn_and_opens_reply() {
    let mut conv = conversation();
    let turn = conv.send("  suggest a thriller  ").expect("turn opens");

    assert_eq!(conv.messages().len(), 2);
    assert_eq!(conv.messages()[0].role, Role::User);
    assert_eq!(
        conv.messages()[0].first_text(),
        Some("suggest a thriller")
    );
    assert_eq!(conv.messages()[1].role, Role::Assistant);
    assert!(conv.messages()[1].fragments.is_empty());
    assert_eq!(conv.messages()[1].id, turn.reply_id);
    assert_eq!(conv.status(), ChatStatus::Submitted);
}

#[test]
fn request_stops_at_the_user_turn() {
    let mut conv = conversation();
    let turn = conv.send("hello").expect("turn opens");

    assert_eq!(turn.request.len(), 1);
    assert_eq!(turn.request.last().map(|m| m.role), Some(Role::User));
}

#[test]
fn send_is_rejected_while_a_turn_is_in_flight() {
    let mut conv = conversation();
    conv.send("first").expect("turn opens");
    assert!(conv.send("second").is_none());
    assert_eq!(conv.messages().len(), 2);
}

#[test]
fn first_fragment_moves_submitted_to_streaming() {
    let mut conv = conversation();
    let turn = conv.send("hello").expect("turn opens");

    let changed = conv.apply_event(TurnEvent::Fragment {
        message_id: turn.reply_id.clone(),
        fragment: Fragment::text("Hi"),
    });

    assert!(changed);
    assert_eq!(conv.status(), ChatStatus::Streaming);
}

#[test]
fn streamed_text_chunks_grow_a_single_fragment() {
    let mut conv = conversation();
    let turn = conv.send("hello").expect("turn opens");

    for chunk in ["Try ", "**Heat**", " tonight."] {
        conv.apply_event(TurnEvent::Fragment {
            message_id: turn.reply_id.clone(),
            fragment: Fragment::text(chunk),
        });
    }

    let reply = conv.messages().last().expect("reply exists");
    assert_eq!(reply.fragments.len(), 1);
    assert_eq!(reply.first_text(), Some("Try **Heat** tonight."));
}

#[test]
fn tool_fragments_append_in_arrival_order() {
    let mut conv = conversation();
    let turn = conv.send("something noir").expect("turn opens");

    conv.apply_event(TurnEvent::Fragment {
        message_id: turn.reply_id.clone(),
        fragment: Fragment::text("Let me look."),
    });
    conv.apply_event(TurnEvent::Fragment {
        message_id: turn.reply_id.clone(),
        fragment: Fragment::ToolCall {
            tool_name: "tmdb_search_movies".to_string(),
            args: json!({"query": "noir"}),
        },
    });
    conv.apply_event(TurnEvent::Fragment {
        message_id: turn.reply_id.clone(),
        fragment: Fragment::text("Here are three picks."),
    });

    let reply = conv.messages().last().expect("reply exists");
    assert_eq!(reply.fragments.len(), 3);
    assert!(matches!(reply.fragments[1], Fragment::ToolCall { .. }));
    assert!(matches!(
        &reply.fragments[2],
        Fragment::Text { text } if text == "Here are three picks."
    ));
}

#[test]
fn completed_records_duration_and_returns_idle() {
    let mut conv = conversation();
    let turn = conv.send("hello").expect("turn opens");
    conv.apply_event(TurnEvent::Fragment {
        message_id: turn.reply_id.clone(),
        fragment: Fragment::text("Hi"),
    });

    conv.apply_event(TurnEvent::Completed {
        message_id: turn.reply_id.clone(),
        elapsed_ms: 2300,
    });

    assert_eq!(conv.status(), ChatStatus::Idle);
    assert_eq!(conv.duration_ms(&turn.reply_id), Some(2300));
}

#[test]
fn duration_rerecord_overwrites_instead_of_accumulating() {
    let mut conv = conversation();
    let turn = conv.send("hello").expect("turn opens");

    conv.apply_event(TurnEvent::Completed {
        message_id: turn.reply_id.clone(),
        elapsed_ms: 1000,
    });
    conv.apply_event(TurnEvent::Completed {
        message_id: turn.reply_id.clone(),
        elapsed_ms: 4000,
    });

    assert_eq!(conv.duration_ms(&turn.reply_id), Some(4000));
    assert_eq!(conv.duration_count(), 1);
}

#[test]
fn completed_never_invents_duration_keys_for_cleared_messages() {
    let mut conv = conversation();
    let turn = conv.send("hello").expect("turn opens");
    conv.clear();

    conv.apply_event(TurnEvent::Completed {
        message_id: turn.reply_id,
        elapsed_ms: 900,
    });

    assert_eq!(conv.duration_count(), 0);
}

#[test]
fn failed_sets_error_and_keeps_partial_fragments() {
    let mut conv = conversation();
    let turn = conv.send("hello").expect("turn opens");
    conv.apply_event(TurnEvent::Fragment {
        message_id: turn.reply_id.clone(),
        fragment: Fragment::text("partial answ"),
    });

    conv.apply_event(TurnEvent::Failed {
        reason: "connection dropped".to_string(),
    });

    assert_eq!(conv.status(), ChatStatus::Error);
    assert_eq!(conv.failure_note(), Some("connection dropped"));
    let reply = conv.messages().last().expect("reply exists");
    assert_eq!(reply.first_text(), Some("partial answ"));
    assert!(conv.status().can_send());
}

#[test]
fn stop_during_streaming_is_immediately_idle() {
    let mut conv = conversation();
    let turn = conv.send("hello").expect("turn opens");
    conv.apply_event(TurnEvent::Fragment {
        message_id: turn.reply_id.clone(),
        fragment: Fragment::text("strea"),
    });
    assert_eq!(conv.status(), ChatStatus::Streaming);

    conv.stop();

    assert_eq!(conv.status(), ChatStatus::Idle);
    let reply = conv.messages().last().expect("reply exists");
    assert_eq!(reply.first_text(), Some("strea"));
}

#[test]
fn fragments_after_stop_are_abandoned() {
    let mut conv = conversation();
    let turn = conv.send("hello").expect("turn opens");
    conv.stop();

    let changed = conv.apply_event(TurnEvent::Fragment {
        message_id: turn.reply_id.clone(),
        fragment: Fragment::text("late chunk"),
    });

    assert!(!changed);
    let reply = conv.messages().last().expect("reply exists");
    assert!(reply.fragments.is_empty());
}

#[test]
fn history_never_grows_from_stray_fragment_events() {
    let mut conv = conversation();
    conv.maybe_bootstrap_welcome();
    let welcome_id = conv.messages()[0].id.clone();
    let _turn = conv.send("hello").expect("turn opens");

    let changed = conv.apply_event(TurnEvent::Fragment {
        message_id: welcome_id.clone(),
        fragment: Fragment::text(" tampered"),
    });

    assert!(!changed);
    assert_eq!(conv.messages()[0].fragments.len(), 1);
}

#[test]
fn clear_empties_everything_and_rearms_welcome() {
    let mut conv = conversation();
    conv.maybe_bootstrap_welcome();
    let turn = conv.send("hello").expect("turn opens");
    conv.apply_event(TurnEvent::Completed {
        message_id: turn.reply_id,
        elapsed_ms: 1200,
    });

    conv.clear();

    assert_eq!(conv.messages().len(), 0);
    assert_eq!(conv.duration_count(), 0);

    conv.maybe_bootstrap_welcome();
    assert_eq!(conv.messages().len(), 1);
    assert_eq!(conv.messages()[0].role, Role::Assistant);
    assert_eq!(
        conv.messages()[0].first_text(),
        Some(crate::config::welcome_message().as_str())
    );
}

#[test]
fn welcome_bootstrap_is_one_shot() {
    let mut conv = conversation();
    conv.maybe_bootstrap_welcome();
    conv.maybe_bootstrap_welcome();
    assert_eq!(conv.messages().len(), 1);
    assert!(conv.messages()[0].id.starts_with("welcome-"));
}

#[test]
fn welcome_bootstrap_skips_restored_transcripts() {
    let store = SnapshotStore::open_in_memory().expect("open store");
    store.save(&ConversationSnapshot {
        messages: vec![user_message("user-1", "hi")],
        durations: Default::default(),
    });

    let mut conv = Conversation::load(Some(store));
    conv.maybe_bootstrap_welcome();

    assert_eq!(conv.messages().len(), 1);
    assert_eq!(conv.messages()[0].id, "user-1");
}

#[test]
fn every_mutation_lands_in_the_store() {
    let store = SnapshotStore::open_in_memory().expect("open store");
    let mut conv = Conversation::load(Some(store));
    conv.maybe_bootstrap_welcome();
    let turn = conv.send("hello").expect("turn opens");
    conv.apply_event(TurnEvent::Fragment {
        message_id: turn.reply_id.clone(),
        fragment: Fragment::text("Hi there."),
    });
    conv.apply_event(TurnEvent::Completed {
        message_id: turn.reply_id.clone(),
        elapsed_ms: 1500,
    });
    conv.persist();

    let expected = conv.snapshot();
    let store = conv.take_store().expect("store present");
    assert_eq!(store.load(), expected);
    assert_eq!(expected.messages.len(), 3);
    assert_eq!(expected.durations.get(&turn.reply_id), Some(&1500));
}

#[test]
fn reasoning_fragments_never_render() {
    let message = assistant_message(
        "reply-1",
        vec![
            Fragment::Reasoning {
                text: "the user wants something gritty".to_string(),
            },
            Fragment::text("Try **Se7en**."),
            Fragment::Reasoning {
                text: "double-checking the year".to_string(),
            },
        ],
    );

    let groups = render_message(&message);

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].fragment_index, 1);
    for group in &groups {
        for block in &group.blocks {
            assert!(matches!(block, DisplayBlock::Paragraph(_)));
        }
    }
}

#[test]
fn tool_call_then_result_render_two_status_blocks_and_no_paragraphs() {
    let message = assistant_message(
        "reply-1",
        vec![
            Fragment::ToolCall {
                tool_name: "tmdb_search_movies".to_string(),
                args: json!({"query": "noir"}),
            },
            Fragment::ToolResult {
                tool_name: "tmdb_search_movies".to_string(),
                payload: json!({"movies": [{"title": "The Third Man"}]}),
            },
        ],
    );

    let groups = render_message(&message);
    let blocks: Vec<&DisplayBlock> = groups.iter().flat_map(|g| &g.blocks).collect();

    assert_eq!(blocks.len(), 2);
    assert!(matches!(
        blocks[0],
        DisplayBlock::ToolCall { tool_name, args_preview }
            if tool_name == "tmdb_search_movies" && args_preview.contains("noir")
    ));
    assert!(matches!(
        blocks[1],
        DisplayBlock::ToolResult { tool_name } if tool_name == "tmdb_search_movies"
    ));
}

#[test]
fn render_is_idempotent() {
    let message = assistant_message(
        "reply-1",
        vec![
            Fragment::text("**Heat** (1995)\n\n---\nwww.example.com"),
            Fragment::ToolCall {
                tool_name: "tmdb_search_movies".to_string(),
                args: json!({"query": "heist"}),
            },
        ],
    );

    assert_eq!(render_message(&message), render_message(&message));
}

#[test]
fn assistant_text_splits_into_paragraph_spacing_and_divider_blocks() {
    let message = assistant_message("reply-1", vec![Fragment::text("pick one\n\n---\n**Alien**")]);

    let groups = render_message(&message);
    assert_eq!(groups.len(), 1);
    assert_eq!(
        groups[0].blocks,
        vec![
            DisplayBlock::Paragraph(vec![Span::Plain("pick one".to_string())]),
            DisplayBlock::Spacing,
            DisplayBlock::Divider,
            DisplayBlock::Paragraph(vec![Span::Bold(vec![Span::Plain("Alien".to_string())])]),
        ]
    );
}

#[test]
fn user_text_is_links_only_with_line_breaks_kept() {
    let message = user_message("user-1", "**not bold**\n---\nsee www.example.com");

    let groups = render_message(&message);
    assert_eq!(groups.len(), 1);
    assert_eq!(
        groups[0].blocks,
        vec![
            DisplayBlock::Paragraph(vec![Span::Plain("**not bold**".to_string())]),
            DisplayBlock::Paragraph(vec![Span::Plain("---".to_string())]),
            DisplayBlock::Paragraph(vec![
                Span::Plain("see ".to_string()),
                Span::Link {
                    text: "www.example.com".to_string(),
                    href: "https://www.example.com".to_string(),
                },
            ]),
        ]
    );
}

#[test]
fn user_render_uses_only_the_first_fragment() {
    let mut message = user_message("user-1", "what should I watch?");
    message.fragments.push(Fragment::text("ignored tail"));

    let groups = render_message(&message);
    assert_eq!(groups.len(), 1);
    assert_eq!(
        groups[0].blocks,
        vec![DisplayBlock::Paragraph(vec![Span::Plain(
            "what should I watch?".to_string()
        )])]
    );
}

#[test]
fn empty_messages_render_nothing() {
    let message = assistant_message("reply-1", Vec::new());
    assert!(render_message(&message).is_empty());
}

#[test]
fn legacy_flat_content_still_renders_with_line_breaks() {
    let mut message = assistant_message("reply-1", Vec::new());
    message.content = Some("old line one\nold line two".to_string());

    let groups = render_message(&message);
    assert_eq!(groups.len(), 1);
    assert_eq!(
        groups[0].blocks,
        vec![
            DisplayBlock::Paragraph(vec![Span::Plain("old line one".to_string())]),
            DisplayBlock::Paragraph(vec![Span::Plain("old line two".to_string())]),
        ]
    );
}

#[test]
fn args_preview_is_capped_with_ellipsis() {
    let long_query: String = "x".repeat(200);
    let message = assistant_message(
        "reply-1",
        vec![Fragment::ToolCall {
            tool_name: "tmdb_search_movies".to_string(),
            args: json!({ "query": long_query }),
        }],
    );

    let groups = render_message(&message);
    let DisplayBlock::ToolCall { args_preview, .. } = &groups[0].blocks[0] else {
        panic!("expected tool-call block");
    };
    assert_eq!(args_preview.chars().count(), ARGS_PREVIEW_MAX_CHARS);
    assert!(args_preview.ends_with("..."));
}

#[test]
fn open_reply_is_not_shown_until_first_fragment() {
    let mut conv = conversation();
    conv.maybe_bootstrap_welcome();
    let before = ui::transcript_lines(&conv, 80).len();

    let turn = conv.send("hello").expect("turn opens");
    let with_user = ui::transcript_lines(&conv, 80).len();
    // Only the user bubble appears; the empty reply stays invisible.
    assert!(with_user > before);

    conv.apply_event(TurnEvent::Fragment {
        message_id: turn.reply_id.clone(),
        fragment: Fragment::text("Hi!"),
    });
    assert!(ui::transcript_lines(&conv, 80).len() > with_user);
}

#[test]
fn poll_backend_applies_events_and_finishes_the_turn() {
    let mut app = ChatApp::new();
    let turn = app.conversation.send("recommend a comedy").expect("turn opens");
    let (tx, rx) = unbounded::<TurnEvent>();
    app.push_test_turn(rx);

    tx.send(TurnEvent::Fragment {
        message_id: turn.reply_id.clone(),
        fragment: Fragment::text("Try **Paddington 2**."),
    })
    .expect("send fragment");
    tx.send(TurnEvent::Completed {
        message_id: turn.reply_id.clone(),
        elapsed_ms: 1800,
    })
    .expect("send completed");

    assert!(app.poll_backend());
    assert_eq!(app.conversation.status(), ChatStatus::Idle);
    assert_eq!(app.conversation.duration_ms(&turn.reply_id), Some(1800));
    assert!(app.rx.is_none());
    let reply = app.conversation.messages().last().expect("reply exists");
    assert_eq!(reply.first_text(), Some("Try **Paddington 2**."));
}

#[test]
fn backend_disconnect_without_result_is_a_failure() {
    let mut app = ChatApp::new();
    app.conversation.send("hello").expect("turn opens");
    let (tx, rx) = unbounded::<TurnEvent>();
    app.push_test_turn(rx);
    drop(tx);

    assert!(app.poll_backend());
    assert_eq!(app.conversation.status(), ChatStatus::Error);
    assert!(app.rx.is_none());
}

#[test]
fn stop_turn_ignores_a_boundary_that_never_acknowledges() {
    let mut app = ChatApp::new();
    let turn = app.conversation.send("hello").expect("turn opens");
    let (tx, rx) = unbounded::<TurnEvent>();
    app.push_test_turn(rx);

    app.stop_turn();

    assert_eq!(app.conversation.status(), ChatStatus::Idle);
    assert!(app.rx.is_none());

    // The worker may still be writing; none of it reaches the transcript.
    tx.send(TurnEvent::Fragment {
        message_id: turn.reply_id.clone(),
        fragment: Fragment::text("too late"),
    })
    .ok();
    assert!(!app.poll_backend());
    let reply = app.conversation.messages().last().expect("reply exists");
    assert!(reply.fragments.is_empty());
}

#[test]
fn clear_chat_shows_the_greeting_again() {
    let mut app = ChatApp::new();
    assert_eq!(app.conversation.messages().len(), 1);
    let turn = app.conversation.send("hello").expect("turn opens");
    app.conversation.apply_event(TurnEvent::Completed {
        message_id: turn.reply_id,
        elapsed_ms: 100,
    });

    app.clear_chat();

    assert_eq!(app.conversation.messages().len(), 1);
    assert!(app.conversation.messages()[0].id.starts_with("welcome-"));
    assert_eq!(app.conversation.duration_count(), 0);
}
