//! The platform's public URL table.
//!
//! Order is precedence: specific rules sit above the general ones they would
//! otherwise be shadowed by (`/signin/sent` before `/signin/:token?`, the
//! embed flow before the generic contribution flow, `/:slug` near the end).

use crate::config::RewriteRule;
use crate::routing::router::{RewriteError, RewriteTable, TableOptions};

const CONTRIBUTION_FLOW: &str = "/contribution-flow";

/// Steps of the contribution flow, shared by several sources below.
macro_rules! flow_steps {
    () => {
        "/details|profile|payment|checkout|summary|success"
    };
}

pub const BUILTIN_REWRITES: &[(&str, &str)] = &[
    ("/:pageSlug(become-a-host|become-a-fiscal-host)", "/become-a-host"),
    ("/fiscal-hosting", "/fiscal-hosting"),
    ("/welcome-to-oc", "/welcome"),
    ("/:pageSlug(widgets|tos|privacypolicy|hiring)", "/staticPage"),
    ("/foundation/apply/:step(intro|fees|form|success)", "/ocf-host-application"),
    ("/signin/sent", "/signinLinkSent"),
    ("/signinv2/sent", "/signinLinkSent"),
    ("/oauth/authorize", "/oauth/authorize"),
    ("/deleteCollective/confirmed", "/confirmCollectiveDeletion"),
    ("/create-account/guest", "/guest-join"),
    ("/organizations/new", "/createOrganization"),
    (
        "/:parentCollectiveSlug?/:collectiveType(events|projects)?/:collectiveSlug/updates",
        "/updates",
    ),
    (
        "/:parentCollectiveSlug?/:collectiveType(events|projects)?/:collectiveSlug/updates/new",
        "/createUpdate",
    ),
    (
        "/:parentCollectiveSlug?/:collectiveType(events|projects)?/:collectiveSlug/updates/:updateSlug",
        "/update",
    ),
    ("/:collectiveSlug?/redeem/:code?", "/redeem"),
    ("/:collectiveSlug?/redeemed/:code?", "/redeemed"),
    ("/paymentmethod/:paymentMethodId/update", "/updatePaymentMethod"),
    ("/:collectiveSlug/banner.html", "/banner-iframe"),
    ("/:collectiveSlug/(collectives|widget).html", "/collectives-iframe"),
    ("/redirect", "/external-redirect"),
    ("/signin/:token?", "/signin"),
    ("/signinv2/:token?", "/signinv2"),
    ("/confirm/email/:token", "/confirmEmail"),
    ("/confirm/guest/:token", "/confirm-guest"),
    ("/email/unsubscribe/:email/:slug/:type/:token", "/unsubscribeEmail"),
    ("/:form(create-account)", "/signin"),
    ("/:form(create-accountv2)", "/signinv2"),
    ("/:collectiveSlug/:verb(contribute|donate)/button", "/button"),
    ("/:parentCollectiveSlug/events/(new|create)", "/createEvent"),
    ("/:parentCollectiveSlug/projects/(new|create)", "/create-project"),
    (
        "/:parentCollectiveSlug?/:collectiveType(events|projects)?/:slug/admin/:section?",
        "/admin-panel",
    ),
    (
        "/:parentCollectiveSlug?/:collectiveType(events|projects)?/:collectiveSlug/contact",
        "/collective-contact",
    ),
    (
        "/:hostCollectiveSlug/legacy-dashboard/:view(expenses|pending-applications|hosted-collectives|donations|reports)?",
        "/host.dashboard",
    ),
    (
        "/:parentCollectiveSlug?/:collectiveType(events|projects)?/:collectiveSlug/transactions",
        "/transactions",
    ),
    (
        "/:parentCollectiveSlug?/:type(events|projects)?/:collectiveSlug/expenses/new",
        "/create-expense",
    ),
    (
        "/:parentCollectiveSlug?/:collectiveType(events|projects)?/:collectiveSlug/expenses/:ExpenseId([0-9]+)/:version(v2)?",
        "/expense",
    ),
    (
        "/:parentCollectiveSlug?/:collectiveType(events|projects)?/:collectiveSlug/expenses/:version(v2)?",
        "/expenses",
    ),
    (
        "/:parentCollectiveSlug?/:collectiveType(events|projects)?/:collectiveSlug/orders",
        "/orders",
    ),
    (
        "/:parentCollectiveSlug?/:collectiveType(events|projects)?/:collectiveSlug/orders/:OrderId([0-9]+)",
        "/order",
    ),
    ("/orders/:id([0-9]+)/confirm", "/confirmOrder"),
    ("/fund/:verb(apply|create)/:step(form)?", "/create-fund"),
    // Collective creation wizard
    (
        "/:hostCollectiveSlug?/:verb(create)/:version(v2)?/:category(opensource|community|climate)?/:step(form)?",
        "/create-collective",
    ),
    // Events and projects render on the collective page
    ("/:parentCollectiveSlug/events/:slug", "/collective-page"),
    ("/:parentCollectiveSlug/projects/:slug", "/collective-page"),
    // Ways to contribute
    (
        "/:collectiveSlug/:verb(tiers|contribute|events|projects|connected-collectives)",
        "/contribute",
    ),
    // Embedded contribution flow
    (
        concat!(
            "/embed/:parentCollectiveSlug?/:collectiveType(events|projects)?/:collectiveSlug/:verb(donate)/:paymentFlow(crypto)?/:step(",
            flow_steps!(),
            ")?"
        ),
        "/embed/contribution-flow",
    ),
    (
        concat!(
            "/embed/:parentCollectiveSlug?/:collectiveType(events|projects)?/:collectiveSlug/contribute/:tierSlug?-:tierId([0-9]+)/:step(",
            flow_steps!(),
            ")?"
        ),
        "/embed/contribution-flow",
    ),
    // Tier page
    (
        "/:parentCollectiveSlug?/:collectiveType(events|projects)?/:collectiveSlug/:verb(tiers|contribute)/:tierSlug?-:tierId([0-9]+)",
        "/tier",
    ),
    // Conversations
    ("/:collectiveSlug/conversations", "/conversations"),
    ("/:collectiveSlug/conversations/new", "/create-conversation"),
    ("/:collectiveSlug/conversations/:slug?-:id([a-z0-9]+)", "/conversation"),
    // Legacy order route
    (
        r"/:collectiveSlug/:verb(order)/:tierId/:amount(\d+)?/:interval(month|monthly|year|yearly)?",
        CONTRIBUTION_FLOW,
    ),
    // Legacy tier route
    (
        concat!(
            "/:collectiveSlug/:verb(donate|pay|contribute|order|events)/tier/:tierId-:tierSlug?/:step(",
            flow_steps!(),
            ")?"
        ),
        CONTRIBUTION_FLOW,
    ),
    // Contribution flow
    (
        concat!(
            "/:parentCollectiveSlug?/:collectiveType(events|projects)?/:collectiveSlug/:verb(donate)/:paymentFlow(crypto)?/:step(",
            flow_steps!(),
            ")?"
        ),
        CONTRIBUTION_FLOW,
    ),
    (
        concat!(
            "/:parentCollectiveSlug?/:collectiveType(events|projects)?/:collectiveSlug/:verb(contribute)/:tierSlug?-:tierId([0-9]+)/checkout/:step(",
            flow_steps!(),
            ")?"
        ),
        CONTRIBUTION_FLOW,
    ),
    (
        r"/:collectiveSlug/:verb(donate|pay|order)/:amount(\d+)?/:interval(month|monthly|year|yearly)?/:description?",
        CONTRIBUTION_FLOW,
    ),
    (
        concat!(
            "/:collectiveSlug/:verb(events|projects)/:eventSlug/order/:tierId/:step(",
            flow_steps!(),
            ")?"
        ),
        CONTRIBUTION_FLOW,
    ),
    // Pledges
    ("/pledges/new", "/createPledge"),
    ("/:slug/pledges/new", "/createPledge"),
    // Marketing
    ("/:pageSlug(gift-of-giving|gift-cards)", "/marketingPage"),
    (
        "/:slug/accept-financial-contributions/:path(ourselves|myself|organization|host)?/:method(stripe|bank)?/:state(success)?",
        "/accept-financial-contributions",
    ),
    ("/:slug/recurring-contributions", "/recurring-contributions"),
    ("/recurring-contributions", "/recurring-contributions"),
    ("/:slug/subscriptions", "/recurring-contributions"),
    // Top-level pages
    ("/", "/home"),
    ("/search", "/search"),
    ("/pricing", "/pricing"),
    ("/pricing-old", "/pricing-old"),
    ("/become-a-sponsor", "/become-a-sponsor"),
    ("/how-it-works", "/how-it-works"),
    ("/e2c", "/e2c"),
    ("/:action(help|contact)/:formConfirmation(success)?", "/help-and-support"),
    ("/member-invitations", "/member-invitations"),
    ("/applications", "/applications"),
    // Collective page
    ("/:slug", "/collective-page"),
    (
        "/:slug/:action(apply)?/:mode(onboarding)?/:step(administrators|contact-info|success)?",
        "/collective-page",
    ),
    ("/opencollective/root-actions/:section?", "/root-actions"),
    ("/:hostCollectiveSlug/terms", "/terms-of-fiscal-sponsorship"),
];

/// The built-in table as config rules.
pub fn builtin_rules() -> Vec<RewriteRule> {
    BUILTIN_REWRITES
        .iter()
        .map(|(source, destination)| RewriteRule::new(*source, *destination))
        .collect()
}

pub fn builtin_table(options: &TableOptions) -> Result<RewriteTable, RewriteError> {
    RewriteTable::compile(&builtin_rules(), options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RewriteTable {
        builtin_table(&TableOptions::default()).unwrap()
    }

    fn destination(path: &str) -> Option<String> {
        table().resolve(path).map(|r| r.destination)
    }

    #[test]
    fn test_builtin_table_compiles() {
        assert_eq!(table().len(), BUILTIN_REWRITES.len());
    }

    #[test]
    fn test_static_pages() {
        assert_eq!(destination("/").as_deref(), Some("/home"));
        assert_eq!(destination("/welcome-to-oc").as_deref(), Some("/welcome"));
        assert_eq!(destination("/tos").as_deref(), Some("/staticPage"));
        assert_eq!(destination("/signin/sent").as_deref(), Some("/signinLinkSent"));
        assert_eq!(destination("/help").as_deref(), Some("/help-and-support"));
    }

    #[test]
    fn test_signin_token() {
        let t = table();
        let with_token = t.resolve("/signin/abc123").unwrap();
        assert_eq!(with_token.destination, "/signin");
        assert_eq!(with_token.params.get_str("token"), Some("abc123"));

        let bare = t.resolve("/signin").unwrap();
        assert_eq!(bare.destination, "/signin");
        assert!(!bare.params.contains("token"));
    }

    #[test]
    fn test_create_event() {
        let res = table().resolve("/acme/events/new").unwrap();
        assert_eq!(res.destination, "/createEvent");
        assert_eq!(res.params.get_str("parentCollectiveSlug"), Some("acme"));
        assert_eq!(res.params.len(), 1);
    }

    #[test]
    fn test_order_confirmation() {
        let res = table().resolve("/orders/123/confirm").unwrap();
        assert_eq!(res.destination, "/confirmOrder");
        assert_eq!(res.params.get_str("id"), Some("123"));
    }

    #[test]
    fn test_collective_page() {
        let res = table().resolve("/acme").unwrap();
        assert_eq!(res.destination, "/collective-page");
        assert_eq!(res.rewritten_uri(None), "/collective-page?slug=acme");
        assert_eq!(destination("/acme/").as_deref(), Some("/collective-page"));
    }

    #[test]
    fn test_event_page() {
        let res = table().resolve("/acme/events/summer-camp").unwrap();
        assert_eq!(res.destination, "/collective-page");
        assert_eq!(res.params.get_str("parentCollectiveSlug"), Some("acme"));
        assert_eq!(res.params.get_str("slug"), Some("summer-camp"));
    }

    #[test]
    fn test_tier_page() {
        let res = table().resolve("/acme/contribute/gold-42").unwrap();
        assert_eq!(res.destination, "/tier");
        assert_eq!(res.params.get_str("collectiveSlug"), Some("acme"));
        assert_eq!(res.params.get_str("tierSlug"), Some("gold"));
        assert_eq!(res.params.get_str("tierId"), Some("42"));
    }

    #[test]
    fn test_expense_page() {
        let res = table().resolve("/acme/expenses/123").unwrap();
        assert_eq!(res.destination, "/expense");
        assert!(!res.params.contains("parentCollectiveSlug"));
        assert_eq!(res.params.get_str("ExpenseId"), Some("123"));
    }

    #[test]
    fn test_contribution_flow() {
        let res = table().resolve("/acme/donate/50/month").unwrap();
        assert_eq!(res.destination, CONTRIBUTION_FLOW);
        assert_eq!(
            res.rewritten_uri(None),
            "/contribution-flow?collectiveSlug=acme&verb=donate&amount=50&interval=month"
        );

        let simple = table().resolve("/acme/donate").unwrap();
        assert_eq!(simple.destination, CONTRIBUTION_FLOW);
        assert!(!simple.params.contains("parentCollectiveSlug"));
    }

    #[test]
    fn test_embed_precedes_generic_flow() {
        let t = table();
        let res = t.resolve("/embed/acme/donate").unwrap();
        assert_eq!(res.destination, "/embed/contribution-flow");
        assert_eq!(res.params.get_str("collectiveSlug"), Some("acme"));

        let shadowed: Vec<_> = t.matches("/embed/acme/donate").into_iter().map(|r| r.destination).collect();
        assert!(shadowed.contains(&CONTRIBUTION_FLOW.to_string()));
    }

    #[test]
    fn test_iframes() {
        assert_eq!(destination("/acme/banner.html").as_deref(), Some("/banner-iframe"));
        let res = table().resolve("/acme/widget.html").unwrap();
        assert_eq!(res.destination, "/collectives-iframe");
        assert_eq!(res.params.len(), 1);
    }

    #[test]
    fn test_create_collective() {
        let res = table().resolve("/create").unwrap();
        assert_eq!(res.destination, "/create-collective");
        assert_eq!(res.params.get_str("verb"), Some("create"));
    }

    #[test]
    fn test_ways_to_contribute() {
        let res = table().resolve("/acme/events").unwrap();
        assert_eq!(res.destination, "/contribute");
        assert_eq!(res.params.get_str("verb"), Some("events"));
    }
}
