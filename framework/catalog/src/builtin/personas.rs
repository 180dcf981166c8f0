use crate::persona::{CommunicationStyle, Persona, PersonaRole, Urgency};
use serde_json::json;

pub(crate) fn personas() -> Vec<Persona> {
    vec![
        startup_sarah(),
        enterprise_eric(),
        skeptical_sam(),
        ready_rachel(),
        technical_tom(),
        browsing_brenda(),
    ]
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Brief writers move faster through a site, detailed writers slower.
fn pace_for(style: CommunicationStyle) -> f64 {
    match style {
        CommunicationStyle::Brief => 0.7,
        CommunicationStyle::Questioning | CommunicationStyle::Scripted => 1.0,
        CommunicationStyle::Detailed => 1.4,
    }
}

fn startup_sarah() -> Persona {
    Persona {
        id: "startup_sarah".to_string(),
        name: "Sarah Mitchell".to_string(),
        company: "TechFlow Solutions".to_string(),
        role: PersonaRole::DecisionMaker,
        urgency: Urgency::High,
        budget: "$5K-$15K".to_string(),
        tech_savvy: 7,
        communication_style: CommunicationStyle::Questioning,
        pain_points: strings(&[
            "Manual lead follow-up taking too long",
            "Inconsistent sales messaging",
            "No visibility into pipeline health",
            "Losing deals due to slow response times",
        ]),
        objection_probability: 0.3,
        common_objections: strings(&[
            "How quickly can this be implemented?",
            "What kind of ROI can I expect?",
            "Do you have case studies from similar companies?",
        ]),
        pace: pace_for(CommunicationStyle::Questioning),
        diagnostic_responses: Some(json!({
            "business_challenges": {
                "primary_challenges": ["Manual lead follow-up", "Inconsistent messaging", "Pipeline visibility"],
                "current_impact": "Estimated $200K in lost revenue due to slow follow-up"
            },
            "tech_stack": {
                "crm": "HubSpot",
                "email": "Google Workspace",
                "other_tools": ["Slack", "Notion", "Calendly"]
            },
            "automation_needs": {
                "priority_areas": ["Lead scoring and routing", "Automated follow-up sequences"]
            },
            "ai_readiness": {"readiness_score": 7, "concerns": ["Data privacy", "Cost"]},
            "budget_timeline": {"budget_range": "$5,000-$15,000", "timeline": "Want to start within 30 days"},
            "decision_making": {"decision_maker": true, "stakeholders": ["CEO", "Sales Manager"]}
        })),
    }
}

fn enterprise_eric() -> Persona {
    Persona {
        id: "enterprise_eric".to_string(),
        name: "Eric Thompson".to_string(),
        company: "GlobalTech Industries".to_string(),
        role: PersonaRole::Researcher,
        urgency: Urgency::Low,
        budget: "$50K+".to_string(),
        tech_savvy: 8,
        communication_style: CommunicationStyle::Detailed,
        pain_points: strings(&[
            "Complex approval processes slow everything down",
            "Need to integrate with legacy systems",
            "Security and compliance requirements",
            "Scaling solutions across multiple departments",
        ]),
        objection_probability: 0.5,
        common_objections: strings(&[
            "We need to see detailed documentation and security certifications",
            "How does this integrate with our existing enterprise systems?",
            "What is your SLA and support structure?",
            "We require a formal RFP process",
        ]),
        pace: pace_for(CommunicationStyle::Detailed),
        diagnostic_responses: Some(json!({
            "business_challenges": {
                "primary_challenges": ["Legacy system integration", "Multi-department coordination", "Compliance requirements"],
                "current_impact": "Inefficiencies costing approximately $500K annually"
            },
            "tech_stack": {
                "crm": "Salesforce Enterprise",
                "erp": "SAP",
                "other_tools": ["ServiceNow", "Jira", "Confluence"]
            },
            "automation_needs": {
                "priority_areas": ["Cross-department workflow automation", "Compliance reporting"]
            },
            "ai_readiness": {"readiness_score": 6, "concerns": ["Data governance", "Vendor lock-in"]},
            "budget_timeline": {"budget_range": "$50,000+", "timeline": "Q3 implementation target"},
            "decision_making": {"decision_maker": false, "stakeholders": ["CTO", "VP of Operations", "Procurement"]}
        })),
    }
}

fn skeptical_sam() -> Persona {
    Persona {
        id: "skeptical_sam".to_string(),
        name: "Sam Rodriguez".to_string(),
        company: "Rodriguez Consulting".to_string(),
        role: PersonaRole::BudgetHolder,
        urgency: Urgency::Medium,
        budget: "$1K-$5K".to_string(),
        tech_savvy: 5,
        communication_style: CommunicationStyle::Questioning,
        pain_points: strings(&[
            "Have been burned by overpromising vendors before",
            "Tight budget constraints",
            "Not sure if automation is worth the investment",
        ]),
        objection_probability: 0.8,
        common_objections: strings(&[
            "This seems expensive for what it does",
            "We tried something similar before and it did not work",
            "Can you prove this will actually save us money?",
            "What happens if we want to cancel?",
        ]),
        pace: pace_for(CommunicationStyle::Questioning),
        diagnostic_responses: Some(json!({
            "business_challenges": {
                "primary_challenges": ["Limited budget", "Small team", "Skeptical of new tools"],
                "current_impact": "Hard to quantify"
            },
            "tech_stack": {"crm": "Spreadsheets", "email": "Outlook"},
            "automation_needs": {"priority_areas": ["Invoicing", "Client follow-up"]},
            "ai_readiness": {"readiness_score": 3, "concerns": ["Cost", "Reliability", "Learning curve"]},
            "budget_timeline": {"budget_range": "$1,000-$5,000", "timeline": "No rush"},
            "decision_making": {"decision_maker": true, "stakeholders": ["Business partner"]}
        })),
    }
}

fn ready_rachel() -> Persona {
    Persona {
        id: "ready_rachel".to_string(),
        name: "Rachel Chen".to_string(),
        company: "InnovateTech Co".to_string(),
        role: PersonaRole::DecisionMaker,
        urgency: Urgency::High,
        budget: "$15K-$50K".to_string(),
        tech_savvy: 8,
        communication_style: CommunicationStyle::Brief,
        pain_points: strings(&[
            "Current system is failing and need replacement ASAP",
            "Growth is outpacing our processes",
            "Team is frustrated with manual workarounds",
        ]),
        objection_probability: 0.1,
        common_objections: strings(&[
            "When can we start?",
            "What is the fastest implementation timeline?",
        ]),
        pace: pace_for(CommunicationStyle::Brief),
        diagnostic_responses: Some(json!({
            "business_challenges": {
                "primary_challenges": ["System failure", "Rapid growth", "Process bottlenecks"],
                "current_impact": "Critical - current system failing"
            },
            "tech_stack": {
                "crm": "Legacy system (being replaced)",
                "marketing": "HubSpot Marketing",
                "other_tools": ["Slack", "Asana", "Figma"]
            },
            "automation_needs": {"priority_areas": ["Complete CRM replacement", "Sales automation"]},
            "ai_readiness": {"readiness_score": 9, "concerns": ["Migration from legacy system"]},
            "budget_timeline": {"budget_range": "$15,000-$50,000", "timeline": "Need to start this month"},
            "decision_making": {"decision_maker": true, "stakeholders": ["CEO already aligned"]}
        })),
    }
}

fn technical_tom() -> Persona {
    Persona {
        id: "technical_tom".to_string(),
        name: "Tom Anderson".to_string(),
        company: "DevOps Masters".to_string(),
        role: PersonaRole::Technical,
        urgency: Urgency::Medium,
        budget: "$5K-$15K".to_string(),
        tech_savvy: 10,
        communication_style: CommunicationStyle::Detailed,
        pain_points: strings(&[
            "Need to understand API capabilities",
            "Integration complexity with existing systems",
            "Worried about vendor lock-in",
            "Need robust error handling and monitoring",
        ]),
        objection_probability: 0.4,
        common_objections: strings(&[
            "What APIs and webhooks do you support?",
            "How do you handle rate limiting and retries?",
            "What is your uptime SLA?",
            "Can we access our data if we leave?",
        ]),
        pace: pace_for(CommunicationStyle::Detailed),
        diagnostic_responses: Some(json!({
            "business_challenges": {
                "primary_challenges": ["Integration complexity", "System reliability", "Technical debt"],
                "current_impact": "Dev team spending 30% time on maintenance"
            },
            "tech_stack": {
                "crm": "Custom built on PostgreSQL",
                "infrastructure": "AWS + Kubernetes",
                "other_tools": ["GitHub", "CircleCI", "PagerDuty", "Terraform"]
            },
            "automation_needs": {"priority_areas": ["API orchestration", "Event-driven workflows"]},
            "ai_readiness": {"readiness_score": 9, "concerns": ["Model versioning", "Inference latency"]},
            "budget_timeline": {"budget_range": "$5,000-$15,000 initially", "timeline": "After technical evaluation"},
            "decision_making": {"decision_maker": false, "stakeholders": ["CTO", "Engineering Lead"]}
        })),
    }
}

fn browsing_brenda() -> Persona {
    Persona {
        id: "browsing_brenda".to_string(),
        name: "Brenda Williams".to_string(),
        company: "Williams & Associates".to_string(),
        role: PersonaRole::Researcher,
        urgency: Urgency::Low,
        budget: "$1K-$5K".to_string(),
        tech_savvy: 4,
        communication_style: CommunicationStyle::Brief,
        pain_points: strings(&[
            "Not sure what I need yet",
            "Just researching options",
            "Curious about AI but not committed",
        ]),
        objection_probability: 0.6,
        common_objections: strings(&[
            "I am just looking for now",
            "Can you send me some information to read later?",
            "I need to think about it",
        ]),
        pace: pace_for(CommunicationStyle::Brief),
        diagnostic_responses: Some(json!({
            "business_challenges": {
                "primary_challenges": ["Not sure yet", "General inefficiencies"],
                "current_impact": "Unknown - have not quantified"
            },
            "tech_stack": {"crm": "Maybe HubSpot free tier", "email": "Gmail"},
            "automation_needs": {"priority_areas": ["Not sure yet"]},
            "ai_readiness": {"readiness_score": 2, "concerns": ["Everything - very new to this"]},
            "budget_timeline": {"budget_range": "Not sure", "timeline": "No timeline"},
            "decision_making": {"decision_maker": true, "stakeholders": ["Just me"]}
        })),
    }
}
