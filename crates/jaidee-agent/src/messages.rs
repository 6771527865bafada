//! User-facing texts.

pub const BUSY_NOTICE: &str =
    "Please wait a moment, I'm still working on your previous message.";

pub const SESSION_EXPIRED: &str = "Your previous session has expired, so we're starting fresh.\n\n\
     🔄 Type /status to see your saved conversation history\n\
     ❓ Type /help for the list of commands";

pub const APOLOGY: &str =
    "Sorry, something went wrong while I was processing your message. Please try again.";

pub const EMERGENCY_NOTICE: &str = "⚠️ It sounds like you may be at risk right now.\n\
     Please reach out for help:\n\
     📞 Mental health hotline 1323\n\
     📞 Drug abuse hotline 1165";

pub const FOLLOW_UP: &str = "Hi, it's Jaidee checking in on how you've been doing.\n\
     Would you like to tell me how things have gone since we last talked?";

pub const SUMMARY_PREFIX: &str = "Summary of our earlier conversation: ";

pub const SUMMARY_INSTRUCTION: &str =
    "Here is an earlier conversation. Summarize its key points briefly, keeping any \
     assessment results, risk signals, treatment plans and appointments:\n";

pub const RESET_DONE: &str = "Your conversation history has been deleted.";

pub const HELP: &str = "Hi 👋 I'm Jaidee, here to talk through substance use and how it \
     affects you.\n\n\
     💬 You can:\n\
     - start an assessment by answering questions about your use\n\
     - talk about the effects substances have on your life\n\
     - ask for ways to manage cravings\n\n\
     📋 Commands:\n\
     📊 /status - your usage statistics\n\
     📈 /progress - your risk assessment history\n\
     🚨 /emergency - emergency contacts and hotlines\n\
     📩 /feedback - tell us how to improve\n\
     🗑️ /reset - delete your conversation history\n\
     ❓ /help - show this menu";

pub const EMERGENCY: &str = "🚨 Emergency help 🚨\n\n\
     If you notice any of these:\n\
     - an overdose\n\
     - seizures or trouble breathing\n\
     - thoughts of hurting yourself\n\n\
     📞 Call:\n\
     - Department of Disease Control hotline 1422\n\
     - Drug abuse counselling centre 1165\n\
     - Emergency medical services 1669";

pub const FEEDBACK: &str = "🌟 Your feedback matters to us.\n\n\
     Just write what you liked or what could be better in your next message.\n\
     Thank you for helping Jaidee improve 🙏";

pub const NO_PROGRESS: &str = "There is no progress data yet.";

pub const UNKNOWN_COMMAND: &str = "Unknown command. Type /help to see all commands.";
