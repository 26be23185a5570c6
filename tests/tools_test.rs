//! Integration tests for the calendar tools

mod test_utils;

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use tailortalk::ai::TimeNormalizer;
    use tailortalk::ai::tools::{BookMeetingTool, CheckCalendarTool};
    use tailortalk::openai::ToolCall;

    use crate::test_utils::{FakeGateway, event};

    fn book_meeting(gateway: std::sync::Arc<FakeGateway>) -> BookMeetingTool {
        BookMeetingTool::new(gateway, TimeNormalizer::new(chrono_tz::Asia::Kolkata))
    }

    #[tokio::test]
    async fn it_rejects_a_booking_without_both_times() {
        let gateway = FakeGateway::with_events(vec![]);
        let tool = book_meeting(gateway.clone());

        let output = tool
            .call(r#"{"summary": "Sync", "start_time": "tomorrow at 10 PM"}"#)
            .await
            .unwrap();

        assert_eq!(output, "❌ Please provide both start_time and end_time.");
        assert!(gateway.created().is_empty());
    }

    #[tokio::test]
    async fn it_rejects_times_it_cannot_understand() {
        let gateway = FakeGateway::with_events(vec![]);
        let tool = book_meeting(gateway.clone());

        let output = tool
            .call(r#"{"start_time": "whenever works", "end_time": "tomorrow at 11 PM"}"#)
            .await
            .unwrap();

        assert!(output.starts_with("❌ Couldn't understand the start_time"));
        assert!(output.contains("whenever works"));
        assert!(gateway.created().is_empty());
    }

    #[tokio::test]
    async fn it_books_a_one_hour_meeting() {
        let gateway = FakeGateway::with_events(vec![]);
        let tool = book_meeting(gateway.clone());

        let output = tool
            .call(r#"{"start_time": "tomorrow at 10 PM", "end_time": "tomorrow at 11 PM"}"#)
            .await
            .unwrap();

        let created = gateway.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].summary, "General Meeting");
        assert_eq!(created[0].timezone, "Asia/Kolkata");
        assert_eq!(
            created[0].interval.end - created[0].interval.start,
            TimeDelta::hours(1)
        );

        assert!(output.starts_with("✅ Meeting **'General Meeting'** booked from **"));
        assert!(output.contains("10:00 PM to 11:00 PM IST**"));
        assert!(output.ends_with("🔗 [View in Calendar](https://calendar.google.com/event?eid=evt1)"));
    }

    #[tokio::test]
    async fn it_reports_a_failed_booking() {
        let gateway = FakeGateway::failing(403, "Forbidden");
        let tool = book_meeting(gateway.clone());

        let output = tool
            .call(r#"{"summary": "Sync", "start_time": "2026-10-20T16:30:00Z", "end_time": "2026-10-20T17:30:00Z"}"#)
            .await
            .unwrap();

        assert_eq!(
            output,
            "❌ Booking failed: calendar service returned 403: Forbidden"
        );
    }

    #[tokio::test]
    async fn it_says_free_for_an_empty_calendar() {
        let gateway = FakeGateway::with_events(vec![]);
        let tool = CheckCalendarTool::new(gateway.clone());

        let output = tool.call("{}").await.unwrap();

        assert_eq!(output, "✅ You're free!");
        assert_eq!(gateway.list_calls(), 1);
    }

    #[tokio::test]
    async fn it_lists_events_in_order() {
        let gateway = FakeGateway::with_events(vec![
            event("Standup", "2026-10-20T09:00:00+05:30"),
            event("Design review", "2026-10-20T14:00:00+05:30"),
            event("1:1", "2026-10-21T10:30:00+05:30"),
        ]);
        let tool = CheckCalendarTool::new(gateway);

        // The query is ignored, even when it isn't valid JSON
        let output = tool.call("what's on tomorrow?").await.unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(
            lines,
            vec![
                "• **Standup** at `2026-10-20T09:00:00+05:30`",
                "• **Design review** at `2026-10-20T14:00:00+05:30`",
                "• **1:1** at `2026-10-21T10:30:00+05:30`",
            ]
        );
    }

    #[tokio::test]
    async fn it_reports_a_failed_calendar_check() {
        let gateway = FakeGateway::failing(500, "Backend Error");
        let tool = CheckCalendarTool::new(gateway);

        let output = tool.call("{}").await.unwrap();

        assert_eq!(
            output,
            "❌ Calendar check failed: calendar service returned 500: Backend Error"
        );
    }
}
